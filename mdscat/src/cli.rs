use std::path::PathBuf;
use std::sync::OnceLock;

use clap::{
    Args,
    Parser,
    ValueEnum,
    builder::styling::{
        AnsiColor,
        Effects,
        Styles,
    },
};
use serde::Serialize;

use shared::{
    anyhow::anyhow,
    info,
    warn,
    Result,
};
use crate::core::{
    ConfigFile,
    Configurable,
    JobDefinition,
    JobInput,
    JobRunner,
    Outcome,
    Plugins,
    RunningMode,
    Status,
};
use crate::jobs::{
    job_catalog,
    prepare,
    JOB_NAMES,
};
use crate::logging::{logger_init, logger_redirect};
use crate::version::Version;


pub fn get_style() -> Styles {
    static INSTANCE: OnceLock<Styles> = OnceLock::new();
    INSTANCE.get_or_init(|| {
        Styles::styled()
            .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
            .usage(AnsiColor::Green.on_default()   | Effects::BOLD)
            .literal(AnsiColor::Green.on_default() | Effects::BOLD)
            .placeholder(AnsiColor::BrightBlue.on_default())
            .error(AnsiColor::BrightRed.on_default())
            .valid(AnsiColor::BrightYellow.on_default())
    }).to_owned()
}


pub trait OptProcess : Parser {
    fn process(&self) -> Result<()>;
}


#[derive(Debug, Parser)]
#[command(name = "mdscat",
          about = Version::new().to_string(),
          long_about = format!("{:#}", Version::new()),
          version,
          styles = get_style())]
enum Opt {
    /// Dynamic incoherent structure factor.
    Disf(JobCommand),
    /// Mean square displacement.
    Msd(JobCommand),
    /// Print the parameters accepted by a job.
    Catalog(CatalogCommand),
}


impl OptProcess for Opt {
    fn process(&self) -> Result<()> {
        logger_init();
        info!("Global logger initialized with stderr as target.");

        match self {
            Opt::Disf(cmd) => cmd.process_job::<crate::jobs::Disf>(),
            Opt::Msd(cmd) => cmd.process_job::<crate::jobs::Msd>(),
            Opt::Catalog(cmd) => cmd.print(),
        }
    }
}


pub fn run() -> Result<()> {
    Opt::parse().process()
}


#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum TemplateGenerator {
    #[value(aliases=["config", "cfg", "conf"])]
    /// Generate a config template holding the default value of every parameter.
    /// Aliases: "config", "cfg" and "conf".
    ConfigTemplate,
}


#[derive(Debug, Args)]
/// Run an analysis according to its config file.
struct JobCommand {
    #[arg(short='c', long, aliases=["cfg", "conf"])]
    /// Config file name, "<job>.toml" if absent.
    ///
    /// Aliases: "cfg", "conf".
    config: Option<PathBuf>,

    #[arg(short, long)]
    /// Number of threads, overrides the running mode of the config file.
    ///
    /// 1 runs the job serially, 0 uses every logical core.
    nthreads: Option<usize>,

    #[arg(long, value_enum, alias="gen")]
    /// Generate auxiliary files instead of running the job.
    ///
    /// Alias: "gen".
    generate: Option<TemplateGenerator>,
}


impl JobCommand {
    fn process_job<J: JobDefinition>(&self) -> Result<()> {
        let plugins = Plugins::builtin();

        if let Some(TemplateGenerator::ConfigTemplate) = self.generate {
            let configurable = Configurable::new(J::catalog(), &plugins)?;
            let fname = format!("{}_config_template.toml", J::NAME);
            info!("Writing config template of {} to {:?} ...", J::LABEL, fname);
            return JobInput::new(J::NAME, configurable.defaults().clone()).to_file(fname);
        }

        let fname = self.config.clone()
            .unwrap_or_else(|| PathBuf::from(format!("{}.toml", J::NAME)));
        let input = JobInput::from_file(&fname)?;
        input.print_to_log();

        let status = Status::new();
        let prepared = prepare::<J>(input.get_values(), &plugins, &status)?;
        logger_redirect(&prepared.output_dir)?;
        info!("Resolved parameters of {}:\n{}", J::LABEL, prepared.information);

        let mode = match self.nthreads {
            Some(1) => RunningMode::Serial,
            Some(nthreads) => RunningMode::Parallel { nthreads },
            None => prepared.running_mode,
        };

        let mut job = prepared.job;
        match JobRunner::new(mode).with_status(status).run(&mut job)? {
            Outcome::Completed(()) => info!("The results are written to {:?}", prepared.output_dir),
            Outcome::Cancelled => warn!("{} cancelled, nothing written.", J::LABEL),
        }
        Ok(())
    }
}


#[derive(Debug, Args)]
/// Print the parameters a job accepts: their kinds, dependencies and default values.
struct CatalogCommand {
    #[arg(value_parser = JOB_NAMES)]
    job: String,
}


#[derive(Serialize)]
struct CatalogListing {
    job: String,
    configurators: Vec<CatalogEntry>,
}


#[derive(Serialize)]
struct CatalogEntry {
    name: String,
    kind: String,
    label: String,
    default: toml::Value,
    dependencies: toml::Table,
}


impl CatalogCommand {
    fn print(&self) -> Result<()> {
        let catalog = job_catalog(&self.job)
            .ok_or_else(|| anyhow!("Unknown job '{}', available: {:?}", self.job, JOB_NAMES))?;
        let plugins = Plugins::builtin();
        let configurable = Configurable::new(catalog, &plugins)?;

        let configurators = configurable.catalog().specs().iter()
            .map(|s| CatalogEntry {
                name: s.name.clone(),
                kind: s.kind.clone(),
                label: s.label.clone(),
                default: configurable.defaults().get(&s.name).cloned()
                    .unwrap_or_else(|| toml::Value::String(String::new())),
                dependencies: s.dependencies.iter()
                    .map(|(role, target)| (role.clone(), toml::Value::String(target.clone())))
                    .collect(),
            })
            .collect();

        let listing = CatalogListing { job: self.job.clone(), configurators };
        println!("{}", toml::to_string(&listing)?);
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_parse_args() {
        Opt::command().debug_assert();

        let opt = Opt::try_parse_from(["mdscat", "disf", "-c", "water.toml", "-n", "4"]).unwrap();
        match opt {
            Opt::Disf(cmd) => {
                assert_eq!(cmd.config, Some(PathBuf::from("water.toml")));
                assert_eq!(cmd.nthreads, Some(4));
                assert!(cmd.generate.is_none());
            },
            _ => panic!("expected the disf subcommand"),
        }

        let opt = Opt::try_parse_from(["mdscat", "msd", "--gen", "cfg"]).unwrap();
        assert!(matches!(opt, Opt::Msd(JobCommand { generate: Some(TemplateGenerator::ConfigTemplate), .. })));

        assert!(Opt::try_parse_from(["mdscat", "catalog", "vacf"]).is_err());
        assert!(Opt::try_parse_from(["mdscat", "catalog", "msd"]).is_ok());
    }

    #[test]
    fn test_catalog_listing_serializes() {
        let entry = CatalogEntry {
            name: "frames".into(),
            kind: "frames".into(),
            label: "frames".into(),
            default: toml::Value::Array([0, -1, 1].map(toml::Value::Integer).to_vec()),
            dependencies: [("trajectory".to_string(), toml::Value::String("trajectory".into()))].into_iter().collect(),
        };
        let txt = toml::to_string(&CatalogListing { job: "msd".into(), configurators: vec![entry] }).unwrap();
        assert!(txt.contains("[[configurators]]"));
        assert!(txt.contains("kind = \"frames\""));
    }
}
