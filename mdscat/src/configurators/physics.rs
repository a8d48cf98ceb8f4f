use std::any::Any;
use std::f64::consts::PI;

use shared::{
    info,
    ndarray::Array1,
    numeric_methods::{fft_freq_1d, fftshift},
};

use crate::core::{
    value_as_f64,
    Configuration,
    Configurator,
    ConfiguratorSpec,
    Outcome,
    ResolveContext,
};
use crate::error::{ConfigurationError, Error, Result};
use crate::qvectors::{
    QShell,
    QVectorsDefinition,
};
use crate::resolutions::ResolutionKernel;
use crate::trajectory::Projector;
use super::{
    FramesConfigurator,
    TrajectoryConfigurator,
};


/// Coordinate projection: `"null"`, `{ axial = [x, y, z] }` or `{ planar = [x, y, z] }`.
pub struct ProjectionConfigurator {
    spec: ConfiguratorSpec,
    value: Option<Projector>,
}


impl ProjectionConfigurator {
    pub fn new(spec: &ConfiguratorSpec) -> Result<Self, ConfigurationError> {
        spec.check_options(&[])?;
        Ok(Self { spec: spec.clone(), value: None })
    }

    pub fn get_projector(&self) -> Projector {
        self.value.unwrap_or_default()
    }
}


impl Configurator for ProjectionConfigurator {
    fn spec(&self) -> &ConfiguratorSpec { &self.spec }

    fn default_value(&self) -> toml::Value {
        toml::Value::String("null".to_string())
    }

    fn configure(&mut self, raw: &toml::Value, ctx: &ResolveContext) -> Result<()> {
        let projector = match raw {
            toml::Value::String(s) if s.eq_ignore_ascii_case("null") => Projector::Null,
            toml::Value::Table(t) if t.len() == 1 => {
                let (kind, dir) = t.iter().next()
                    .ok_or_else(|| ctx.invalid(raw, "empty projection table"))?;
                let dir = dir.as_array()
                    .filter(|a| a.len() == 3)
                    .and_then(|a| a.iter().map(value_as_f64).collect::<Option<Vec<_>>>())
                    .ok_or_else(|| ctx.invalid(raw, "the direction should be 3 numbers"))?;
                let dir = [dir[0], dir[1], dir[2]];
                let projector = match kind.as_str() {
                    "axial" => Projector::axial(dir),
                    "planar" => Projector::planar(dir),
                    _ => return Err(ctx.invalid(raw, format!("unknown projection '{}'", kind)).into()),
                };
                projector.ok_or_else(|| ctx.invalid(raw, "null direction"))?
            },
            _ => return Err(ctx.invalid(raw, "expected \"null\", { axial = [x, y, z] } or { planar = [x, y, z] }").into()),
        };
        self.value = Some(projector);
        Ok(())
    }

    fn is_configured(&self) -> bool { self.value.is_some() }

    fn get_information(&self) -> String {
        format!("Projection: {}", self.get_projector())
    }

    fn as_any(&self) -> &dyn Any { self }
}


/// Split `{ <key> = "<plugin>", <parameters> ... }` into the plugin name and the
/// parameter table.
fn plugin_table<'v>(raw: &'v toml::Value, key: &str, ctx: &ResolveContext) -> Result<(&'v str, toml::Table), ConfigurationError> {
    let t = raw.as_table()
        .ok_or_else(|| ctx.invalid(raw, format!("expected a table with a '{}' key", key)))?;
    let name = t.get(key)
        .and_then(|n| n.as_str())
        .ok_or_else(|| ctx.invalid(raw, format!("'{}' should be a string", key)))?;
    let params = t.iter()
        .filter(|(k, _)| k.as_str() != key)
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    Ok((name, params))
}


/// Q vectors produced by a generator plugin on the unit cell of the first frame:
///
/// ```toml
/// q_vectors = { generator = "spherical_lattice", seed = 42, shells = [2.0, 20.0, 2.0], n_vectors = 50, width = 1.0 }
/// ```
pub struct QVectorsConfigurator {
    spec: ConfiguratorSpec,
    default: toml::Value,
    generator: String,
    parameters: Option<Configuration>,
    value: QVectorsDefinition,
    shells: Vec<f64>,
    configured: bool,
}


impl QVectorsConfigurator {
    pub fn new(spec: &ConfiguratorSpec) -> Result<Self, ConfigurationError> {
        spec.check_options(&["default"])?;
        spec.check_dependencies(&["trajectory"])?;
        let default = match spec.option("default") {
            Some(d @ toml::Value::Table(_)) => d.clone(),
            Some(_) => return Err(ConfigurationError::definition(&spec.name, "option 'default' should be a table")),
            None => {
                let mut t = toml::Table::new();
                t.insert("generator".to_string(), toml::Value::String("spherical_lattice".to_string()));
                toml::Value::Table(t)
            },
        };
        Ok(Self {
            spec: spec.clone(),
            default,
            generator: String::new(),
            parameters: None,
            value: QVectorsDefinition::new(),
            shells: vec![],
            configured: false,
        })
    }

    pub fn get_generator(&self) -> &str { &self.generator }

    /// Resolved parameters of the generator.
    pub fn get_parameters(&self) -> Option<&Configuration> { self.parameters.as_ref() }

    pub fn get_value(&self) -> &QVectorsDefinition { &self.value }

    /// Radii of the non-empty shells, ascending.
    pub fn get_shells(&self) -> &[f64] { &self.shells }

    pub fn n_shells(&self) -> usize { self.shells.len() }

    pub fn shell(&self, q: f64) -> Option<&QShell> {
        self.value.get(&ordered_float::OrderedFloat(q))
    }
}


impl Configurator for QVectorsConfigurator {
    fn spec(&self) -> &ConfiguratorSpec { &self.spec }

    fn default_value(&self) -> toml::Value {
        self.default.clone()
    }

    fn configure(&mut self, raw: &toml::Value, ctx: &ResolveContext) -> Result<()> {
        let traj = ctx.dependency::<TrajectoryConfigurator>("trajectory")?.get_instance()?;
        let (generator, params) = plugin_table(raw, "generator", ctx)?;
        let plugin = ctx.plugins().qvectors.get(generator)
            .ok_or_else(|| ctx.invalid(raw, format!("unknown generator, available: {:?}",
                        ctx.plugins().qvectors.names().collect::<Vec<_>>())))?;
        let cell = traj.cell(0)
            .ok_or_else(|| ctx.invalid(raw, "the trajectory has no unit cell"))?;

        let parameters = Configuration::resolve(&(plugin.catalog)(), ctx.plugins(), &params, ctx.status())
            .map_err(|e| e.nested(ctx.name()))?;
        let gen = (plugin.build)(&parameters, &cell).map_err(|e| e.nested(ctx.name()))?;

        info!("Generating q vectors with '{}' ...", generator);
        let value = match gen.generate(ctx.status()) {
            Outcome::Completed(v) => v,
            Outcome::Cancelled => return Err(Error::Cancelled),
        };
        if value.is_empty() {
            return Err(ctx.invalid(raw, "no q vector matches the requested shells").into());
        }

        self.shells = value.keys().map(|q| q.into_inner()).collect();
        self.value = value;
        self.generator = generator.to_string();
        self.parameters = Some(parameters);
        self.configured = true;
        Ok(())
    }

    fn is_configured(&self) -> bool { self.configured }

    fn get_information(&self) -> String {
        let mut ret = format!("Q vectors from '{}': {} shells", self.generator, self.shells.len());
        for shell in self.value.values() {
            ret += &format!("\n    q = {:>10.4} inv nm: {} vectors", shell.q, shell.n_q_vectors);
        }
        ret
    }

    fn as_any(&self) -> &dyn Any { self }
}


/// Instrument resolution applied to the spectra, computed on the frequency grid of the
/// selected frames:
///
/// ```toml
/// instrument_resolution = { kernel = "gaussian", mu = 0.0, sigma = 1.0 }
/// ```
pub struct InstrumentResolutionConfigurator {
    spec: ConfiguratorSpec,
    kernel: String,
    parameters: Option<Configuration>,
    frequencies: Array1<f64>,
    frequency_step: f64,
    time_step: f64,
    windows: Option<ResolutionKernel>,
}


impl InstrumentResolutionConfigurator {
    pub fn new(spec: &ConfiguratorSpec) -> Result<Self, ConfigurationError> {
        spec.check_options(&[])?;
        spec.check_dependencies(&["frames"])?;
        Ok(Self {
            spec: spec.clone(),
            kernel: String::new(),
            parameters: None,
            frequencies: Array1::zeros(0),
            frequency_step: 0.0,
            time_step: 0.0,
            windows: None,
        })
    }

    pub fn get_kernel(&self) -> &str { &self.kernel }
    pub fn get_parameters(&self) -> Option<&Configuration> { self.parameters.as_ref() }

    /// Centred angular frequencies (rad/ps), `2 n - 1` points for `n` frames.
    pub fn get_frequencies(&self) -> &Array1<f64> { &self.frequencies }
    pub fn n_frequencies(&self) -> usize { self.frequencies.len() }
    pub fn get_frequency_step(&self) -> f64 { self.frequency_step }
    pub fn get_time_step(&self) -> f64 { self.time_step }

    pub fn get_frequency_window(&self) -> Array1<f64> {
        self.windows.as_ref().map(|w| w.frequency_window.clone()).unwrap_or_else(|| Array1::zeros(0))
    }

    pub fn get_time_window(&self) -> Array1<f64> {
        self.windows.as_ref().map(|w| w.time_window.clone()).unwrap_or_else(|| Array1::zeros(0))
    }
}


impl Configurator for InstrumentResolutionConfigurator {
    fn spec(&self) -> &ConfiguratorSpec { &self.spec }

    fn default_value(&self) -> toml::Value {
        let mut t = toml::Table::new();
        t.insert("kernel".to_string(), toml::Value::String("ideal".to_string()));
        toml::Value::Table(t)
    }

    fn configure(&mut self, raw: &toml::Value, ctx: &ResolveContext) -> Result<()> {
        let frames = ctx.dependency::<FramesConfigurator>("frames")?;
        let nframes = frames.number();
        let dt = frames.get_time_step();
        if nframes < 2 || dt <= 0.0 {
            return Err(ctx.invalid(raw, "at least two frames are required for a spectrum").into());
        }

        let (kernel, params) = plugin_table(raw, "kernel", ctx)?;
        let plugin = ctx.plugins().resolutions.get(kernel)
            .ok_or_else(|| ctx.invalid(raw, format!("unknown kernel, available: {:?}",
                        ctx.plugins().resolutions.names().collect::<Vec<_>>())))?;
        let parameters = Configuration::resolve(&(plugin.catalog)(), ctx.plugins(), &params, ctx.status())
            .map_err(|e| e.nested(ctx.name()))?;
        let resolution = (plugin.build)(&parameters).map_err(|e| e.nested(ctx.name()))?;

        let nfreq = 2 * nframes - 1;
        let freq: Array1<f64> = fft_freq_1d(nfreq, dt);
        let frequencies = fftshift(freq.mapv(|f| 2.0 * PI * f).view());
        let windows = resolution.set_kernel(frequencies.view(), dt);

        self.frequency_step = frequencies[1] - frequencies[0];
        self.frequencies = frequencies;
        self.time_step = dt;
        self.kernel = kernel.to_string();
        self.parameters = Some(parameters);
        self.windows = Some(windows);
        Ok(())
    }

    fn is_configured(&self) -> bool { self.windows.is_some() }

    fn get_information(&self) -> String {
        format!("Instrument resolution '{}': {} frequencies, step {:.6} rad/ps",
            self.kernel, self.frequencies.len(), self.frequency_step)
    }

    fn as_any(&self) -> &dyn Any { self }
}
