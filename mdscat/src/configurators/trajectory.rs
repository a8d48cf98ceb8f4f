use std::any::Any;
use std::path::PathBuf;
use std::sync::Arc;

use shared::ndarray::Array1;

use crate::core::{
    value_as_f64,
    Configurator,
    ConfiguratorSpec,
    ResolveContext,
};
use crate::error::{ConfigurationError, Result};
use crate::trajectory::{
    Trajectory,
    TrajectoryFormat,
};
use super::normalize_path;


/// MD trajectory file, given as a path or as a table
///
/// ```toml
/// trajectory = { path = "XDATCAR.gz", format = "xdatcar", time_step = 0.001 }
/// ```
///
/// `time_step` (ps) is only used by formats without time information. The loaded
/// trajectory is shared read-only with the job.
pub struct TrajectoryConfigurator {
    spec: ConfiguratorSpec,
    path: PathBuf,
    format: Option<TrajectoryFormat>,
    instance: Option<Arc<Trajectory>>,
}


impl TrajectoryConfigurator {
    pub fn new(spec: &ConfiguratorSpec) -> Result<Self, ConfigurationError> {
        spec.check_options(&[])?;
        Ok(Self {
            spec: spec.clone(),
            path: PathBuf::new(),
            format: None,
            instance: None,
        })
    }

    /// Shared handle to the loaded trajectory.
    pub fn get_instance(&self) -> Result<Arc<Trajectory>, ConfigurationError> {
        self.instance.clone()
            .ok_or_else(|| ConfigurationError::NotConfigured(self.spec.name.clone()))
    }

    pub fn get_path(&self) -> &std::path::Path { &self.path }
}


impl Configurator for TrajectoryConfigurator {
    fn spec(&self) -> &ConfiguratorSpec { &self.spec }

    fn default_value(&self) -> toml::Value {
        toml::Value::String(String::new())
    }

    fn configure(&mut self, raw: &toml::Value, ctx: &ResolveContext) -> Result<()> {
        let (path, format, time_step) = match raw {
            toml::Value::String(p) => (p.as_str(), None, 1.0),
            toml::Value::Table(t) => {
                if let Some(k) = t.keys().find(|k| !["path", "format", "time_step"].contains(&k.as_str())) {
                    return Err(ctx.invalid(raw, format!("unknown key '{}'", k)).into());
                }
                let path = t.get("path")
                    .and_then(|p| p.as_str())
                    .ok_or_else(|| ctx.invalid(raw, "'path' should be a string"))?;
                let format = t.get("format")
                    .map(|f| f.as_str()
                        .ok_or_else(|| ctx.invalid(raw, "'format' should be a string"))
                        .and_then(|f| f.parse::<TrajectoryFormat>().map_err(|e| ctx.invalid(raw, e))))
                    .transpose()?;
                let time_step = t.get("time_step")
                    .map(|v| value_as_f64(v)
                        .filter(|&dt| dt > 0.0)
                        .ok_or_else(|| ctx.invalid(raw, "'time_step' should be a positive number")))
                    .transpose()?
                    .unwrap_or(1.0);
                (path, format, time_step)
            },
            _ => return Err(ctx.invalid(raw, "expected a path or { path, format, time_step }").into()),
        };

        if path.trim().is_empty() {
            return Err(ctx.invalid(raw, "no trajectory file given").into());
        }
        let path = normalize_path(path).map_err(|e| ctx.invalid(raw, e.to_string()))?;
        if !path.is_file() {
            return Err(ctx.invalid(raw, format!("file {:?} does not exist", path)).into());
        }

        let format = format.unwrap_or_else(|| TrajectoryFormat::detect(&path));
        let traj = Trajectory::from_file(&path, format, time_step)
            .map_err(|e| ctx.invalid(raw, e.to_string()))?;

        self.path = path;
        self.format = Some(format);
        self.instance = Some(Arc::new(traj));
        Ok(())
    }

    fn is_configured(&self) -> bool { self.instance.is_some() }

    fn get_information(&self) -> String {
        match self.instance.as_ref() {
            Some(t) => format!("Trajectory {:?}: {} frames, {} atoms, time step {} ps",
                self.path, t.nframes(), t.natoms(), t.time_step()),
            None => "Trajectory: not loaded".to_string(),
        }
    }

    fn as_any(&self) -> &dyn Any { self }
}


/// Frames of the trajectory used by the analysis, `[first, last, step]` with `last`
/// excluded and `-1` standing for the end of the trajectory.
pub struct FramesConfigurator {
    spec: ConfiguratorSpec,
    value: Vec<usize>,
    first: usize,
    last: usize,
    step: usize,
    time: Array1<f64>,
    time_step: f64,
    configured: bool,
}


impl FramesConfigurator {
    pub fn new(spec: &ConfiguratorSpec) -> Result<Self, ConfigurationError> {
        spec.check_options(&[])?;
        spec.check_dependencies(&["trajectory"])?;
        Ok(Self {
            spec: spec.clone(),
            value: vec![],
            first: 0,
            last: 0,
            step: 1,
            time: Array1::zeros(0),
            time_step: 0.0,
            configured: false,
        })
    }

    /// Selected frame indices.
    pub fn get_value(&self) -> &[usize] { &self.value }
    pub fn first(&self) -> usize { self.first }
    /// Last selected frame, included.
    pub fn last(&self) -> usize { self.last }
    pub fn step(&self) -> usize { self.step }
    pub fn number(&self) -> usize { self.value.len() }

    /// Time of the selected frames (ps).
    pub fn get_time(&self) -> &Array1<f64> { &self.time }

    /// Time relative to the first selected frame (ps).
    pub fn get_relative_time(&self) -> Array1<f64> {
        let t0 = self.time.first().copied().unwrap_or(0.0);
        self.time.mapv(|t| t - t0)
    }

    /// Time between two selected frames (ps).
    pub fn get_time_step(&self) -> f64 { self.time_step }
}


impl Configurator for FramesConfigurator {
    fn spec(&self) -> &ConfiguratorSpec { &self.spec }

    fn default_value(&self) -> toml::Value {
        toml::Value::Array(vec![toml::Value::Integer(0), toml::Value::Integer(-1), toml::Value::Integer(1)])
    }

    fn configure(&mut self, raw: &toml::Value, ctx: &ResolveContext) -> Result<()> {
        let traj = ctx.dependency::<TrajectoryConfigurator>("trajectory")?.get_instance()?;
        let nframes = traj.nframes() as i64;

        let [first, last, step] = raw.as_array()
            .filter(|a| a.len() == 3)
            .and_then(|a| a.iter().map(|x| x.as_integer()).collect::<Option<Vec<_>>>())
            .and_then(|a| <[i64; 3]>::try_from(a).ok())
            .ok_or_else(|| ctx.invalid(raw, "expected [first, last, step] integers"))?;

        let last = if last == -1 { nframes } else { last };
        if step <= 0 {
            return Err(ctx.invalid(raw, "step should be positive").into());
        }
        if first < 0 || first >= nframes {
            return Err(ctx.invalid(raw, format!("first frame should be in [0, {})", nframes)).into());
        }
        if last <= first || last > nframes {
            return Err(ctx.invalid(raw, format!("last frame should be in ({}, {}] or -1", first, nframes)).into());
        }

        let (first, last, step) = (first as usize, last as usize, step as usize);
        self.value = (first .. last).step_by(step).collect();
        self.first = first;
        self.last = self.value.last().copied().unwrap_or(first);
        self.step = step;
        self.time = self.value.iter().map(|&i| traj.get_time()[i]).collect();
        self.time_step = traj.time_step() * step as f64;
        self.configured = true;
        Ok(())
    }

    fn is_configured(&self) -> bool { self.configured }

    fn get_information(&self) -> String {
        format!("{} frames from {} to {} every {} frame(s), time step {} ps",
            self.number(), self.first, self.last, self.step, self.time_step)
    }

    fn as_any(&self) -> &dyn Any { self }
}
