use std::fmt::Write as _;

use indexmap::IndexMap;
use shared::debug;

use crate::core::{
    short_type_name,
    Configurator,
    ConfiguratorCatalog,
    ConfiguratorSpec,
    Plugins,
    ResolveContext,
    Status,
};
use crate::error::{ConfigurationError, Result};


fn instantiate(spec: &ConfiguratorSpec, plugins: &Plugins) -> Result<Box<dyn Configurator>, ConfigurationError> {
    let factory = plugins.configurators.get(&spec.kind)
        .ok_or_else(|| ConfigurationError::UnknownKind {
            name: spec.name.clone(),
            kind: spec.kind.clone(),
        })?;
    factory(spec)
}


/// Check a catalog without configuring anything: dependency graph and every
/// configurator definition.
fn instantiate_all(catalog: &ConfiguratorCatalog, plugins: &Plugins)
    -> Result<(Vec<usize>, Vec<Box<dyn Configurator>>), ConfigurationError>
{
    let order = catalog.resolution_order()?;
    let configurators = catalog.specs().iter()
        .map(|s| instantiate(s, plugins))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((order, configurators))
}


/// Resolved configurators of one job run, in declaration order.
pub struct Configuration {
    configurators: IndexMap<String, Box<dyn Configurator>>,
    order: Vec<String>,
}


impl Configuration {
    /// Resolve every configurator of `catalog` from `input`. Absent entries take the
    /// configurator's default value, unknown entries are rejected. The catalog is fully
    /// validated before the first `configure()` runs.
    pub fn resolve(catalog: &ConfiguratorCatalog,
                   plugins: &Plugins,
                   input: &toml::Table,
                   status: &Status) -> Result<Self> {
        if let Some(key) = input.keys().find(|k| !catalog.contains(k)) {
            return Err(ConfigurationError::UnknownInput(key.clone()).into());
        }

        let (order, configurators) = instantiate_all(catalog, plugins)?;
        let mut slots = configurators.into_iter().map(Some).collect::<Vec<_>>();
        let mut resolved: IndexMap<String, Box<dyn Configurator>> = IndexMap::with_capacity(order.len());

        for &i in order.iter() {
            let spec = &catalog.specs()[i];
            let Some(mut c) = slots[i].take() else {
                unreachable!("configurator '{}' visited twice", spec.name);
            };

            let raw = input.get(&spec.name)
                .cloned()
                .unwrap_or_else(|| c.default_value());
            debug!("Configuring {:>24} ({}) with {}", spec.name, spec.kind, raw);

            let ctx = ResolveContext::new(spec, &resolved, plugins, status);
            c.configure(&raw, &ctx)?;
            resolved.insert(spec.name.clone(), c);
        }

        let order = order.into_iter()
            .map(|i| catalog.specs()[i].name.clone())
            .collect::<Vec<_>>();

        let configurators = catalog.specs().iter()
            .filter_map(|s| resolved.swap_remove_entry(&s.name))
            .collect();

        Ok(Self { configurators, order })
    }


    pub fn get<T: Configurator>(&self, name: &str) -> Result<&T, ConfigurationError> {
        let c = self.configurators.get(name)
            .ok_or_else(|| ConfigurationError::NotConfigured(name.to_string()))?;
        c.as_any()
            .downcast_ref::<T>()
            .ok_or_else(|| ConfigurationError::WrongKind {
                name: name.to_string(),
                expected: short_type_name::<T>(),
            })
    }

    pub fn configurator(&self, name: &str) -> Option<&dyn Configurator> {
        self.configurators.get(name).map(|c| c.as_ref())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.configurators.keys().map(|k| k.as_str())
    }

    /// Order in which the configurators were configured.
    pub fn resolution_order(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.configurators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configurators.is_empty()
    }


    pub fn get_information(&self) -> String {
        let mut ret = String::new();
        for c in self.configurators.values() {
            for line in c.get_information().lines() {
                let _ = writeln!(ret, "{}", line);
            }
        }
        ret
    }
}


/// Raw values of a job's configurators, as edited by a front end before resolution.
pub struct Configurable<'p> {
    catalog: ConfiguratorCatalog,
    plugins: &'p Plugins,
    defaults: toml::Table,
    values: toml::Table,
}


impl<'p> Configurable<'p> {
    pub fn new(catalog: ConfiguratorCatalog, plugins: &'p Plugins) -> Result<Self, ConfigurationError> {
        let (_, configurators) = instantiate_all(&catalog, plugins)?;
        let defaults = configurators.iter()
            .map(|c| (c.name().to_string(), c.default_value()))
            .collect::<toml::Table>();

        Ok(Self {
            catalog,
            plugins,
            defaults,
            values: toml::Table::new(),
        })
    }

    pub fn catalog(&self) -> &ConfiguratorCatalog {
        &self.catalog
    }

    /// Default raw value of every configurator, in declaration order.
    pub fn defaults(&self) -> &toml::Table {
        &self.defaults
    }

    /// Raw values explicitly set so far.
    pub fn values(&self) -> &toml::Table {
        &self.values
    }


    pub fn get_widget_value(&self, name: &str) -> Result<toml::Value, ConfigurationError> {
        self.values.get(name)
            .or_else(|| self.defaults.get(name))
            .cloned()
            .ok_or_else(|| ConfigurationError::UnknownInput(name.to_string()))
    }


    pub fn set_widget_value(&mut self, name: &str, value: toml::Value) -> Result<(), ConfigurationError> {
        if !self.catalog.contains(name) {
            return Err(ConfigurationError::UnknownInput(name.to_string()));
        }
        self.values.insert(name.to_string(), value);
        Ok(())
    }


    /// Set every entry of `input`, stopping at the first unknown name.
    pub fn set_widget_values(&mut self, input: &toml::Table) -> Result<(), ConfigurationError> {
        for (k, v) in input.iter() {
            self.set_widget_value(k, v.clone())?;
        }
        Ok(())
    }


    pub fn resolve(&self, status: &Status) -> Result<Configuration> {
        Configuration::resolve(&self.catalog, self.plugins, &self.values, status)
    }
}
