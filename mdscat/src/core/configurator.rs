use std::any::{type_name, Any};

use indexmap::IndexMap;

use crate::core::{
    ConfiguratorSpec,
    Plugins,
    Status,
};
use crate::error::{ConfigurationError, Result};


/// A named, typed parameter slot. It is created from its [`ConfiguratorSpec`], configured
/// exactly once from a raw input value and read-only afterwards.
pub trait Configurator: Any + Send + Sync {
    fn spec(&self) -> &ConfiguratorSpec;

    fn name(&self) -> &str {
        &self.spec().name
    }

    fn kind(&self) -> &str {
        &self.spec().kind
    }

    /// Raw value used when the input leaves this configurator out.
    fn default_value(&self) -> toml::Value;

    /// Validate `raw` and store the resolved value with its derived state.
    fn configure(&mut self, raw: &toml::Value, ctx: &ResolveContext) -> Result<()>;

    fn is_configured(&self) -> bool;

    /// Short human readable summary of the resolved value.
    fn get_information(&self) -> String;

    fn as_any(&self) -> &dyn Any;
}


pub type ConfiguratorFactory = fn(&ConfiguratorSpec) -> Result<Box<dyn Configurator>, ConfigurationError>;


/// View handed to [`Configurator::configure`]: the siblings resolved so far, reachable
/// only through the roles declared in the configurator's spec.
pub struct ResolveContext<'a> {
    spec: &'a ConfiguratorSpec,
    resolved: &'a IndexMap<String, Box<dyn Configurator>>,
    plugins: &'a Plugins,
    status: &'a Status,
}


impl<'a> ResolveContext<'a> {
    pub(crate) fn new(spec: &'a ConfiguratorSpec,
                      resolved: &'a IndexMap<String, Box<dyn Configurator>>,
                      plugins: &'a Plugins,
                      status: &'a Status) -> Self {
        Self { spec, resolved, plugins, status }
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn plugins(&self) -> &'a Plugins {
        self.plugins
    }

    pub fn status(&self) -> &'a Status {
        self.status
    }

    pub fn has_dependency(&self, role: &str) -> bool {
        self.spec.dependencies.contains_key(role)
    }


    /// Resolved sibling filling `role`, downcast to its concrete configurator type.
    pub fn dependency<T: Configurator>(&self, role: &str) -> Result<&'a T, ConfigurationError> {
        let target = self.spec.dependencies.get(role)
            .ok_or_else(|| ConfigurationError::UndeclaredDependency {
                name: self.spec.name.clone(),
                role: role.to_string(),
            })?;

        let c = self.resolved.get(target)
            .filter(|c| c.is_configured())
            .ok_or_else(|| ConfigurationError::NotConfigured(target.clone()))?;

        c.as_any()
            .downcast_ref::<T>()
            .ok_or_else(|| ConfigurationError::WrongKind {
                name: target.clone(),
                expected: short_type_name::<T>(),
            })
    }


    /// Like [`Self::dependency`], `None` when the role is not declared.
    pub fn optional_dependency<T: Configurator>(&self, role: &str) -> Result<Option<&'a T>, ConfigurationError> {
        if self.has_dependency(role) {
            self.dependency(role).map(Some)
        } else {
            Ok(None)
        }
    }


    pub fn invalid(&self, value: impl std::fmt::Display, reason: impl Into<String>) -> ConfigurationError {
        ConfigurationError::invalid(&self.spec.name, value, reason)
    }
}


pub(crate) fn short_type_name<T>() -> String {
    type_name::<T>()
        .rsplit("::")
        .next()
        .unwrap_or_default()
        .to_string()
}
