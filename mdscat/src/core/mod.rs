pub mod status;
pub use status::*;

pub mod catalog;
pub use catalog::*;

pub mod configurator;
pub use configurator::*;

pub mod configuration;
pub use configuration::*;

pub mod registry;
pub use registry::*;

pub mod job;
pub use job::*;

pub mod config;
pub use config::*;
