use indexmap::IndexMap;

use crate::core::ConfiguratorFactory;
use crate::qvectors::QVectorsPlugin;
use crate::resolutions::ResolutionPlugin;
use crate::selectors::SelectorFactory;


/// Explicit name -> factory mapping. Entries are added by registration calls at
/// startup, later registrations under the same name replace earlier ones.
#[derive(Clone)]
pub struct Registry<F> {
    category: &'static str,
    entries: IndexMap<String, F>,
}


impl<F> Registry<F> {
    pub fn new(category: &'static str) -> Self {
        Self {
            category,
            entries: IndexMap::new(),
        }
    }

    pub fn category(&self) -> &'static str {
        self.category
    }

    /// Returns the replaced entry, if any.
    pub fn register(&mut self, name: &str, factory: F) -> Option<F> {
        self.entries.insert(name.to_string(), factory)
    }

    pub fn get(&self, name: &str) -> Option<&F> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}


/// Every plugin family the engine looks up by name.
#[derive(Clone)]
pub struct Plugins {
    pub configurators: Registry<ConfiguratorFactory>,
    pub selectors: Registry<SelectorFactory>,
    pub qvectors: Registry<QVectorsPlugin>,
    pub resolutions: Registry<ResolutionPlugin>,
}


impl Plugins {
    pub fn empty() -> Self {
        Self {
            configurators: Registry::new("configurator"),
            selectors: Registry::new("selector"),
            qvectors: Registry::new("q vectors generator"),
            resolutions: Registry::new("instrument resolution"),
        }
    }


    /// All plugins shipped with the crate.
    pub fn builtin() -> Self {
        let mut ret = Self::empty();
        crate::configurators::register_all(&mut ret.configurators);
        crate::selectors::register_all(&mut ret.selectors);
        crate::qvectors::register_all(&mut ret.qvectors);
        crate::resolutions::register_all(&mut ret.resolutions);
        ret
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry() {
        let mut reg: Registry<fn() -> i32> = Registry::new("numbers");
        assert!(reg.register("one", || 1).is_none());
        assert!(reg.register("two", || 2).is_none());
        assert!(reg.register("one", || 11).is_some());
        assert_eq!(reg.names().collect::<Vec<_>>(), vec!["one", "two"]);
        assert_eq!((reg.get("one").unwrap())(), 11);
        assert!(reg.get("three").is_none());
    }

    #[test]
    fn test_builtin_plugins() {
        let plugins = Plugins::builtin();
        for kind in ["boolean", "integer", "float", "single_choice", "range", "input_directory",
                     "trajectory", "frames", "instrument_resolution", "q_vectors", "grouping_level",
                     "atom_selection", "atom_transmutation", "projection", "weights", "output_files",
                     "running_mode"] {
            assert!(plugins.configurators.contains(kind), "{kind}");
        }
        assert!(plugins.selectors.contains("molecule_name"));
        assert!(plugins.qvectors.contains("spherical_lattice"));
        assert!(plugins.resolutions.contains("lorentzian"));
    }
}
