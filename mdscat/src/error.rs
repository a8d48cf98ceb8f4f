use std::fmt::Display;

use thiserror::Error;


pub type Result<T, E = Error> = std::result::Result<T, E>;


/// Raised while a job's configuration is being validated and resolved. Every variant
/// names the configurator involved, nested configurators use dotted names such as
/// `q_vectors.width`.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Invalid value {value} for configurator '{name}': {reason}")]
    InvalidValue {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Invalid definition of configurator '{name}': {reason}")]
    Definition { name: String, reason: String },

    #[error("Configurator '{name}' has unknown kind '{kind}'")]
    UnknownKind { name: String, kind: String },

    #[error("Configurator '{name}' depends on unknown configurator '{dependency}'")]
    UnknownDependency { name: String, dependency: String },

    #[error("Configurator '{0}' is declared more than once")]
    DuplicateName(String),

    #[error("Dependency cycle among configurators: {}", .0.join(" -> "))]
    Cycle(Vec<String>),

    #[error("Unknown input parameter '{0}'")]
    UnknownInput(String),

    #[error("Configurator '{name}' reads undeclared dependency '{role}'")]
    UndeclaredDependency { name: String, role: String },

    #[error("Configurator '{0}' is not configured yet")]
    NotConfigured(String),

    #[error("Configurator '{name}' is not a {expected}")]
    WrongKind { name: String, expected: String },
}


impl ConfigurationError {
    pub fn invalid(name: impl Into<String>, value: impl Display, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            name: name.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }


    pub fn definition(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Definition {
            name: name.into(),
            reason: reason.into(),
        }
    }


    /// Prefix the configurator names carried by this error with `parent.`.
    pub fn nested(self, parent: &str) -> Self {
        let p = |n: String| format!("{}.{}", parent, n);
        use ConfigurationError::*;
        match self {
            InvalidValue { name, value, reason } => InvalidValue { name: p(name), value, reason },
            Definition { name, reason } => Definition { name: p(name), reason },
            UnknownKind { name, kind } => UnknownKind { name: p(name), kind },
            UnknownDependency { name, dependency } => UnknownDependency { name: p(name), dependency: p(dependency) },
            DuplicateName(name) => DuplicateName(p(name)),
            Cycle(names) => Cycle(names.into_iter().map(p).collect()),
            UnknownInput(name) => UnknownInput(p(name)),
            UndeclaredDependency { name, role } => UndeclaredDependency { name: p(name), role },
            NotConfigured(name) => NotConfigured(p(name)),
            WrongKind { name, expected } => WrongKind { name: p(name), expected },
        }
    }
}


#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("Computation failed in phase '{phase}': {reason}")]
    Computation { phase: &'static str, reason: String },

    #[error("Trajectory error: {0}")]
    Trajectory(String),

    /// Cooperative stop requested through a `Status`, not a failure.
    #[error("Cancelled by user")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Hdf5(#[from] hdf5::Error),
}


impl Error {
    pub fn computation(phase: &'static str, reason: impl Display) -> Self {
        Self::Computation {
            phase,
            reason: reason.to_string(),
        }
    }


    pub fn trajectory(reason: impl Display) -> Self {
        Self::Trajectory(reason.to_string())
    }


    /// Prefix configurator names of a configuration error, other errors are kept as is.
    pub fn nested(self, parent: &str) -> Self {
        match self {
            Self::Configuration(e) => Self::Configuration(e.nested(parent)),
            e => e,
        }
    }


    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
