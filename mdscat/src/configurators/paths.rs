use std::any::Any;
use std::path::{Component, Path, PathBuf};

use crate::core::{
    Configurator,
    ConfiguratorSpec,
    ResolveContext,
};
use crate::error::{ConfigurationError, Result};
use crate::output::OutputFormat;


/// Absolute form of `path` with `~` expanded and `.`/`..` removed lexically. Symbolic
/// links are not resolved.
pub fn normalize_path<P: AsRef<Path>>(path: P) -> std::io::Result<PathBuf> {
    let path = path.as_ref();

    let expanded = match path.strip_prefix("~") {
        Ok(rest) => match std::env::var_os("HOME") {
            Some(home) => PathBuf::from(home).join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    };

    let absolute = if expanded.is_absolute() {
        expanded
    } else {
        std::env::current_dir()?.join(expanded)
    };

    let mut ret = PathBuf::new();
    for c in absolute.components() {
        match c {
            Component::CurDir => (),
            Component::ParentDir => { ret.pop(); },
            c => ret.push(c.as_os_str()),
        }
    }
    Ok(ret)
}


/// Existing directory, the current working directory by default.
pub struct InputDirectoryConfigurator {
    spec: ConfiguratorSpec,
    value: Option<PathBuf>,
}


impl InputDirectoryConfigurator {
    pub fn new(spec: &ConfiguratorSpec) -> Result<Self, ConfigurationError> {
        spec.check_options(&[])?;
        Ok(Self {
            spec: spec.clone(),
            value: None,
        })
    }

    pub fn get_value(&self) -> Option<&Path> {
        self.value.as_deref()
    }
}


impl Configurator for InputDirectoryConfigurator {
    fn spec(&self) -> &ConfiguratorSpec { &self.spec }

    fn default_value(&self) -> toml::Value {
        let cwd = std::env::current_dir()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|_| ".".to_string());
        toml::Value::String(cwd)
    }

    fn configure(&mut self, raw: &toml::Value, ctx: &ResolveContext) -> Result<()> {
        let raw_path = raw.as_str().ok_or_else(|| ctx.invalid(raw, "expected a path string"))?;
        let path = normalize_path(raw_path).map_err(|e| ctx.invalid(raw, e.to_string()))?;
        if !path.is_dir() {
            return Err(ctx.invalid(raw, format!("directory {:?} does not exist", path)).into());
        }
        self.value = Some(path);
        Ok(())
    }

    fn is_configured(&self) -> bool { self.value.is_some() }

    fn get_information(&self) -> String {
        format!("Input directory: {:?}", self.value.as_deref().unwrap_or(Path::new("")))
    }

    fn as_any(&self) -> &dyn Any { self }
}


/// Output root path and the file formats written under it:
///
/// ```toml
/// output_files = { root = "results/disf", formats = ["hdf5", "ascii"] }
/// ```
///
/// Option `formats` restricts the allowed formats, option `default_root` sets the
/// default root. The parent directory of `root` is created on configuration.
pub struct OutputFilesConfigurator {
    spec: ConfiguratorSpec,
    allowed: Vec<OutputFormat>,
    default_root: String,
    root: Option<PathBuf>,
    formats: Vec<OutputFormat>,
}


impl OutputFilesConfigurator {
    pub fn new(spec: &ConfiguratorSpec) -> Result<Self, ConfigurationError> {
        spec.check_options(&["formats", "default_root"])?;
        let allowed = match spec.opt_str_list("formats")? {
            Some(fs) => fs.iter()
                .map(|f| f.parse::<OutputFormat>())
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| ConfigurationError::definition(&spec.name, e))?,
            None => OutputFormat::ALL.to_vec(),
        };
        if allowed.is_empty() {
            return Err(ConfigurationError::definition(&spec.name, "option 'formats' cannot be empty"));
        }
        Ok(Self {
            spec: spec.clone(),
            allowed,
            default_root: spec.opt_str("default_root")?.unwrap_or("output").to_string(),
            root: None,
            formats: vec![],
        })
    }

    /// Root path without extension, each format appends its own.
    pub fn get_root(&self) -> &Path {
        self.root.as_deref().unwrap_or(Path::new(""))
    }

    pub fn get_formats(&self) -> &[OutputFormat] {
        &self.formats
    }

    /// Directory receiving the output files, also where the run log goes.
    pub fn get_output_dir(&self) -> PathBuf {
        self.get_root()
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }
}


impl Configurator for OutputFilesConfigurator {
    fn spec(&self) -> &ConfiguratorSpec { &self.spec }

    fn default_value(&self) -> toml::Value {
        let mut t = toml::Table::new();
        t.insert("root".to_string(), toml::Value::String(self.default_root.clone()));
        t.insert("formats".to_string(), toml::Value::Array(
            self.allowed.iter().map(|f| toml::Value::String(f.to_string())).collect()
        ));
        toml::Value::Table(t)
    }

    fn configure(&mut self, raw: &toml::Value, ctx: &ResolveContext) -> Result<()> {
        let t = raw.as_table().ok_or_else(|| ctx.invalid(raw, "expected { root = ..., formats = [...] }"))?;
        if let Some(k) = t.keys().find(|k| !["root", "formats"].contains(&k.as_str())) {
            return Err(ctx.invalid(raw, format!("unknown key '{}'", k)).into());
        }

        let root = t.get("root")
            .and_then(|r| r.as_str())
            .filter(|r| !r.trim().is_empty())
            .ok_or_else(|| ctx.invalid(raw, "'root' should be a non-empty path"))?;

        let formats = match t.get("formats") {
            Some(v) => crate::core::value_as_str_list(v)
                .ok_or_else(|| ctx.invalid(raw, "'formats' should be a list of strings"))?
                .iter()
                .map(|f| f.parse::<OutputFormat>().map_err(|e| ctx.invalid(raw, e)))
                .collect::<std::result::Result<Vec<_>, _>>()?,
            None => self.allowed.clone(),
        };
        if formats.is_empty() {
            return Err(ctx.invalid(raw, "at least one format is required").into());
        }
        if let Some(f) = formats.iter().find(|f| !self.allowed.contains(f)) {
            return Err(ctx.invalid(raw, format!("format '{}' is not allowed here, use one of {:?}",
                        f, self.allowed.iter().map(|f| f.to_string()).collect::<Vec<_>>())).into());
        }

        let root = normalize_path(root).map_err(|e| ctx.invalid(raw, e.to_string()))?;
        if let Some(dir) = root.parent() {
            std::fs::create_dir_all(dir)
                .map_err(|e| ctx.invalid(raw, format!("cannot create directory {:?}: {}", dir, e)))?;
        }

        let mut dedup = vec![];
        for f in formats {
            if !dedup.contains(&f) {
                dedup.push(f);
            }
        }

        self.root = Some(root);
        self.formats = dedup;
        Ok(())
    }

    fn is_configured(&self) -> bool { self.root.is_some() }

    fn get_information(&self) -> String {
        format!("Output files: {:?} as {}", self.get_root(),
            self.formats.iter().map(|f| f.to_string()).collect::<Vec<_>>().join(", "))
    }

    fn as_any(&self) -> &dyn Any { self }
}
