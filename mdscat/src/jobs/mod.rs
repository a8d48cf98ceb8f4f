//! Analyses runnable from the command line.

use std::collections::BTreeMap;
use std::path::PathBuf;

use shared::ndarray::ArrayD;

use crate::configurators::{
    OutputFilesConfigurator,
    RunningModeConfigurator,
};
use crate::core::{
    Configuration,
    ConfiguratorCatalog,
    JobDefinition,
    Plugins,
    RunningMode,
    Status,
};
use crate::error::{Error, Result};
use crate::output::OutputData;

pub mod disf;
pub mod msd;

pub use disf::Disf;
pub use msd::Msd;


/// Names of the shipped jobs.
pub const JOB_NAMES: [&str; 2] = [Disf::NAME, Msd::NAME];


pub fn job_catalog(name: &str) -> Option<ConfiguratorCatalog> {
    match name {
        Disf::NAME => Some(Disf::catalog()),
        Msd::NAME => Some(Msd::catalog()),
        _ => None,
    }
}


/// A job built from its resolved configuration, with what the caller needs before
/// handing it to a `JobRunner`.
pub struct PreparedJob<J> {
    pub job: J,
    pub running_mode: RunningMode,
    pub output_dir: PathBuf,
    pub information: String,
}


/// Resolve `values` against the catalog of `J` and build the job. The catalog must
/// declare `running_mode` and `output_files`.
pub fn prepare<J: JobDefinition>(values: &toml::Table, plugins: &Plugins, status: &Status) -> Result<PreparedJob<J>> {
    let cfg = Configuration::resolve(&J::catalog(), plugins, values, status)?;
    let running_mode = cfg.get::<RunningModeConfigurator>("running_mode")?.get_value();
    let output_dir = cfg.get::<OutputFilesConfigurator>("output_files")?.get_output_dir();
    let information = cfg.get_information();
    let job = J::from_configuration(cfg)?;

    Ok(PreparedJob {
        job,
        running_mode,
        output_dir,
        information,
    })
}


/// Header written on top of every output file.
pub(crate) fn output_header(label: &str, cfg: &Configuration) -> String {
    format!("{} computed by mdscat {}\n\n{}", label, env!("CARGO_PKG_VERSION"), cfg.get_information())
}


/// `SUM(w_el * <prefix>_<el>)` over the weighted elements.
pub(crate) fn weighted_total(output: &OutputData, prefix: &str, weights: &BTreeMap<String, f64>) -> Result<ArrayD<f64>> {
    let mut ret: Option<ArrayD<f64>> = None;
    for (el, &w) in weights.iter() {
        let data = output.get(&format!("{}_{}", prefix, el))?.get_data();
        match ret.as_mut() {
            Some(r) => {
                if r.shape() != data.shape() {
                    return Err(Error::computation("finalize",
                            format!("'{}_{}' has shape {:?}, expected {:?}", prefix, el, data.shape(), r.shape())));
                }
                r.scaled_add(w, data);
            },
            None => ret = Some(data * w),
        }
    }
    ret.ok_or_else(|| Error::computation("finalize", format!("no element to sum for '{}'", prefix)))
}
