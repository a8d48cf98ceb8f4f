use std::fmt;
use std::fs;
use std::path::Path;

use shared::{
    anyhow::ensure,
    info,
    warn,
    Context,
    Result,
};


pub trait ConfigFile: Sized + fmt::Display {
    fn from_file<P>(fname: P) -> Result<Self>
        where P: AsRef<Path>;

    fn to_file<P>(&self, fname: P) -> Result<()>
        where P: AsRef<Path>
    {
        if fname.as_ref().is_file() {
            warn!("File {:?} exists, overwriting ...", fname.as_ref());
        }
        fs::write(fname.as_ref(), self.to_string())?;
        Ok(())
    }
}


/// Input file of a job: one top-level TOML entry per configurator.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct JobInput {
    job: String,
    values: toml::Table,
}


impl JobInput {
    pub fn new(job: &str, values: toml::Table) -> Self {
        Self {
            job: job.to_string(),
            values,
        }
    }

    pub fn get_job(&self) -> &str { &self.job }
    pub fn get_values(&self) -> &toml::Table { &self.values }

    pub fn from_str(job: &str, raw: &str) -> Result<Self> {
        let values = toml::from_str::<toml::Table>(raw)?;
        Ok(Self::new(job, values))
    }

    pub fn print_to_log(&self) {
        let input_print = format!("{}", self);
        let hashtag_line = "#".repeat(120);
        info!("Input file loaded. The formatted input is:\n\n{hashtag_line}\n{}\n{hashtag_line}\n\n", input_print);
    }
}


impl fmt::Display for JobInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# mdscat input for the '{}' job", self.job)?;
        writeln!(f)?;

        for (k, v) in self.values.iter() {
            writeln!(f, " {:>24} = {}", k, v)?;
        }

        Ok(())
    }
}


impl ConfigFile for JobInput {
    /// The job name is taken from the file stem.
    fn from_file<P>(fname: P) -> Result<Self>
    where P: AsRef<Path> {
        let fname = fname.as_ref();
        ensure!(fname.is_file(), "Config file {:?} not available.", fname);
        let raw = fs::read_to_string(fname)?;
        let job = fname.file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        Self::from_str(&job, &raw)
            .with_context(|| format!("Failed to parse config file {:?}", fname))
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_round_trip() {
        let txt = r#"
        trajectory = "traj.h5"
        frames = [0, -1, 1]
        q_vectors = { generator = "spherical_lattice", shells = [1.0, 5.0, 1.0], seed = 42 }
        weights = "b_incoherent"
        "#;

        let input = JobInput::from_str("disf", txt).unwrap();
        let printed = input.to_string();
        assert!(printed.starts_with("# mdscat input for the 'disf' job"));

        let parsed = JobInput::from_str("disf", &printed).unwrap();
        assert_eq!(parsed, input);
        assert_eq!(parsed.get_values().keys().collect::<Vec<_>>(),
            vec!["trajectory", "frames", "q_vectors", "weights"]);
    }

    #[test]
    fn test_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let fname = dir.path().join("disf.toml");

        let mut values = toml::Table::new();
        values.insert("running_mode".into(), toml::Value::String("serial".into()));
        let input = JobInput::new("disf", values);
        input.to_file(&fname).unwrap();

        let loaded = JobInput::from_file(&fname).unwrap();
        assert_eq!(loaded, input);
        assert!(JobInput::from_file(dir.path().join("missing.toml")).is_err());
    }
}
