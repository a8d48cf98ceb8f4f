pub mod error;
pub mod version;
pub mod logging;
pub mod cli;

pub mod core;
pub mod trajectory;
pub mod selectors;
pub mod qvectors;
pub mod resolutions;
pub mod configurators;
pub mod output;
pub mod jobs;

pub use error::{ConfigurationError, Error, Result};
