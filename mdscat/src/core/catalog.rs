use std::collections::{BTreeSet, HashMap};

use indexmap::IndexMap;
use pathfinding::prelude::strongly_connected_components;

use crate::error::ConfigurationError;


/// Static definition of one configurator in a job's catalog.
///
/// `dependencies` maps the role a configurator reads (e.g. `trajectory`) to the name of
/// the sibling configurator that fills it.
#[derive(Clone, Debug, PartialEq)]
pub struct ConfiguratorSpec {
    pub name: String,
    pub kind: String,
    pub label: String,
    pub options: toml::Table,
    pub dependencies: IndexMap<String, String>,
}


impl ConfiguratorSpec {
    pub fn new(name: &str, kind: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: kind.to_string(),
            label: name.replace('_', " "),
            options: toml::Table::new(),
            dependencies: IndexMap::new(),
        }
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }

    pub fn with_option(mut self, key: &str, value: impl Into<toml::Value>) -> Self {
        self.options.insert(key.to_string(), value.into());
        self
    }

    pub fn with_dependency(mut self, role: &str, target: &str) -> Self {
        self.dependencies.insert(role.to_string(), target.to_string());
        self
    }

    /// Shorthand of `with_dependency(name, name)`.
    pub fn depends_on(self, name: &str) -> Self {
        self.with_dependency(name, name)
    }


    pub fn check_options(&self, allowed: &[&str]) -> Result<(), ConfigurationError> {
        match self.options.keys().find(|k| !allowed.contains(&k.as_str())) {
            Some(k) => Err(ConfigurationError::definition(&self.name,
                    format!("unknown option '{}' for kind '{}', allowed: {:?}", k, self.kind, allowed))),
            None => Ok(()),
        }
    }

    pub fn check_dependencies(&self, required: &[&str]) -> Result<(), ConfigurationError> {
        match required.iter().find(|r| !self.dependencies.contains_key(**r)) {
            Some(r) => Err(ConfigurationError::definition(&self.name,
                    format!("kind '{}' requires dependency '{}'", self.kind, r))),
            None => Ok(()),
        }
    }

    pub fn option(&self, key: &str) -> Option<&toml::Value> {
        self.options.get(key)
    }

    fn bad_option(&self, key: &str, expected: &str) -> ConfigurationError {
        ConfigurationError::definition(&self.name, format!("option '{}' should be {}", key, expected))
    }

    pub fn opt_f64(&self, key: &str) -> Result<Option<f64>, ConfigurationError> {
        self.option(key)
            .map(|v| value_as_f64(v).ok_or_else(|| self.bad_option(key, "a number")))
            .transpose()
    }

    pub fn opt_i64(&self, key: &str) -> Result<Option<i64>, ConfigurationError> {
        self.option(key)
            .map(|v| v.as_integer().ok_or_else(|| self.bad_option(key, "an integer")))
            .transpose()
    }

    pub fn opt_bool(&self, key: &str) -> Result<Option<bool>, ConfigurationError> {
        self.option(key)
            .map(|v| v.as_bool().ok_or_else(|| self.bad_option(key, "a boolean")))
            .transpose()
    }

    pub fn opt_str(&self, key: &str) -> Result<Option<&str>, ConfigurationError> {
        self.option(key)
            .map(|v| v.as_str().ok_or_else(|| self.bad_option(key, "a string")))
            .transpose()
    }

    pub fn opt_str_list(&self, key: &str) -> Result<Option<Vec<String>>, ConfigurationError> {
        self.option(key)
            .map(|v| value_as_str_list(v).ok_or_else(|| self.bad_option(key, "a list of strings")))
            .transpose()
    }
}


pub fn value_as_f64(v: &toml::Value) -> Option<f64> {
    match v {
        toml::Value::Float(f) => Some(*f),
        toml::Value::Integer(i) => Some(*i as f64),
        _ => None,
    }
}


pub fn value_as_str_list(v: &toml::Value) -> Option<Vec<String>> {
    v.as_array()?
        .iter()
        .map(|s| s.as_str().map(|s| s.to_string()))
        .collect()
}


/// Ordered configurator catalog of a job type. Declaration order is kept, it breaks
/// ties of the dependency ordering.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConfiguratorCatalog {
    specs: Vec<ConfiguratorSpec>,
}


impl ConfiguratorCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, spec: ConfiguratorSpec) -> Self {
        self.specs.push(spec);
        self
    }

    pub fn push(&mut self, spec: ConfiguratorSpec) {
        self.specs.push(spec);
    }

    pub fn specs(&self) -> &[ConfiguratorSpec] {
        &self.specs
    }

    pub fn get(&self, name: &str) -> Option<&ConfiguratorSpec> {
        self.specs.iter().find(|s| s.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }


    /// Indices of the specs in a valid configuration order: each configurator comes
    /// after everything it depends on, among the ready ones the first declared wins.
    pub fn resolution_order(&self) -> Result<Vec<usize>, ConfigurationError> {
        let n = self.specs.len();

        let mut index: HashMap<&str, usize> = HashMap::with_capacity(n);
        for (i, s) in self.specs.iter().enumerate() {
            if index.insert(s.name.as_str(), i).is_some() {
                return Err(ConfigurationError::DuplicateName(s.name.clone()));
            }
        }

        let mut indegree = vec![0usize; n];
        let mut dependents: Vec<Vec<usize>> = vec![vec![]; n];
        let mut prerequisites: Vec<Vec<usize>> = vec![vec![]; n];
        for (i, s) in self.specs.iter().enumerate() {
            let targets = s.dependencies.values().collect::<BTreeSet<_>>();
            for t in targets {
                let j = *index.get(t.as_str())
                    .ok_or_else(|| ConfigurationError::UnknownDependency {
                        name: s.name.clone(),
                        dependency: t.clone(),
                    })?;
                indegree[i] += 1;
                dependents[j].push(i);
                prerequisites[i].push(j);
            }
        }

        let mut ready = (0 .. n).filter(|&i| indegree[i] == 0).collect::<BTreeSet<_>>();
        let mut order = Vec::with_capacity(n);
        while let Some(i) = ready.pop_first() {
            order.push(i);
            for &j in dependents[i].iter() {
                indegree[j] -= 1;
                if indegree[j] == 0 {
                    ready.insert(j);
                }
            }
        }

        if order.len() < n {
            return Err(ConfigurationError::Cycle(self.cycle_members(&indegree, &prerequisites)));
        }

        Ok(order)
    }


    fn cycle_members(&self, indegree: &[usize], prerequisites: &[Vec<usize>]) -> Vec<String> {
        let remaining = (0 .. self.specs.len())
            .filter(|&i| indegree[i] > 0)
            .collect::<Vec<_>>();

        let components = strongly_connected_components(&remaining, |&i| {
            prerequisites[i].iter()
                .copied()
                .filter(|j| indegree[*j] > 0)
                .collect::<Vec<_>>()
        });

        let mut members = components.into_iter()
            .find(|c| c.len() > 1 || prerequisites[c[0]].contains(&c[0]))
            .unwrap_or(remaining);
        members.sort_unstable();

        members.into_iter()
            .map(|i| self.specs[i].name.clone())
            .collect()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn names(catalog: &ConfiguratorCatalog, order: &[usize]) -> Vec<String> {
        order.iter().map(|&i| catalog.specs()[i].name.clone()).collect()
    }

    #[test]
    fn test_topological_order() {
        let catalog = ConfiguratorCatalog::new()
            .with(ConfiguratorSpec::new("trajectory", "trajectory"))
            .with(ConfiguratorSpec::new("frames", "frames").depends_on("trajectory"))
            .with(ConfiguratorSpec::new("atom_selection", "atom_selection")
                .depends_on("trajectory")
                .depends_on("grouping_level"))
            .with(ConfiguratorSpec::new("grouping_level", "grouping_level"))
            .with(ConfiguratorSpec::new("weights", "weights").depends_on("atom_selection"));

        let order = catalog.resolution_order().unwrap();
        assert_eq!(names(&catalog, &order),
            vec!["trajectory", "frames", "grouping_level", "atom_selection", "weights"]);

        for (pos, &i) in order.iter().enumerate() {
            for dep in catalog.specs()[i].dependencies.values() {
                let dep_pos = order.iter().position(|&j| &catalog.specs()[j].name == dep).unwrap();
                assert!(dep_pos < pos);
            }
        }
    }

    #[test]
    fn test_roles_map_to_targets() {
        let catalog = ConfiguratorCatalog::new()
            .with(ConfiguratorSpec::new("weights", "weights").with_dependency("transmutation", "transmutated_atoms"))
            .with(ConfiguratorSpec::new("transmutated_atoms", "atom_transmutation"));
        let order = catalog.resolution_order().unwrap();
        assert_eq!(names(&catalog, &order), vec!["transmutated_atoms", "weights"]);
    }

    #[test]
    fn test_cycle() {
        let catalog = ConfiguratorCatalog::new()
            .with(ConfiguratorSpec::new("free", "integer"))
            .with(ConfiguratorSpec::new("a", "integer").depends_on("c"))
            .with(ConfiguratorSpec::new("b", "integer").depends_on("a"))
            .with(ConfiguratorSpec::new("c", "integer").depends_on("b"))
            .with(ConfiguratorSpec::new("d", "integer").depends_on("c"));

        match catalog.resolution_order() {
            Err(ConfigurationError::Cycle(members)) => assert_eq!(members, vec!["a", "b", "c"]),
            other => panic!("cycle expected, got {:?}", other),
        }

        let catalog = ConfiguratorCatalog::new()
            .with(ConfiguratorSpec::new("self", "integer").depends_on("self"));
        assert!(matches!(catalog.resolution_order(), Err(ConfigurationError::Cycle(m)) if m == vec!["self"]));
    }

    #[test]
    fn test_invalid_catalogs() {
        let catalog = ConfiguratorCatalog::new()
            .with(ConfiguratorSpec::new("a", "integer").depends_on("missing"));
        assert!(matches!(catalog.resolution_order(), Err(ConfigurationError::UnknownDependency { .. })));

        let catalog = ConfiguratorCatalog::new()
            .with(ConfiguratorSpec::new("a", "integer"))
            .with(ConfiguratorSpec::new("a", "float"));
        assert!(matches!(catalog.resolution_order(), Err(ConfigurationError::DuplicateName(_))));
    }

    #[test]
    fn test_options() {
        let spec = ConfiguratorSpec::new("n_vectors", "integer")
            .with_option("mini", 1i64)
            .with_option("default", 50i64);
        assert!(spec.check_options(&["mini", "maxi", "default"]).is_ok());
        assert!(spec.check_options(&["default"]).is_err());
        assert_eq!(spec.opt_i64("mini").unwrap(), Some(1));
        assert_eq!(spec.opt_f64("default").unwrap(), Some(50.0));
        assert!(spec.opt_str("mini").is_err());
        assert_eq!(spec.label, "n vectors");
    }
}
