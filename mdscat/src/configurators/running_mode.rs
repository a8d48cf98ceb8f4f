use std::any::Any;

use crate::core::{
    Configurator,
    ConfiguratorSpec,
    ResolveContext,
    RunningMode,
};
use crate::error::{ConfigurationError, Result};


/// `"serial"`, `"parallel"` or `{ mode = "parallel", nthreads = 4 }`, `nthreads = 0`
/// meaning every core.
pub struct RunningModeConfigurator {
    spec: ConfiguratorSpec,
    value: Option<RunningMode>,
}


impl RunningModeConfigurator {
    pub fn new(spec: &ConfiguratorSpec) -> Result<Self, ConfigurationError> {
        spec.check_options(&[])?;
        Ok(Self { spec: spec.clone(), value: None })
    }

    pub fn get_value(&self) -> RunningMode {
        self.value.unwrap_or_default()
    }
}


impl Configurator for RunningModeConfigurator {
    fn spec(&self) -> &ConfiguratorSpec { &self.spec }

    fn default_value(&self) -> toml::Value {
        toml::Value::String("parallel".to_string())
    }

    fn configure(&mut self, raw: &toml::Value, ctx: &ResolveContext) -> Result<()> {
        let (mode, nthreads) = match raw {
            toml::Value::String(m) => (m.as_str(), 0),
            toml::Value::Table(t) => {
                if let Some(k) = t.keys().find(|k| !["mode", "nthreads"].contains(&k.as_str())) {
                    return Err(ctx.invalid(raw, format!("unknown key '{}'", k)).into());
                }
                let mode = t.get("mode")
                    .and_then(|m| m.as_str())
                    .ok_or_else(|| ctx.invalid(raw, "'mode' should be a string"))?;
                let nthreads = match t.get("nthreads") {
                    Some(n) => n.as_integer()
                        .filter(|&n| n >= 0)
                        .ok_or_else(|| ctx.invalid(raw, "'nthreads' should be a non-negative integer"))?,
                    None => 0,
                };
                (mode, nthreads as usize)
            },
            _ => return Err(ctx.invalid(raw, "expected \"serial\", \"parallel\" or { mode, nthreads }").into()),
        };

        let value = match mode {
            "serial" => RunningMode::Serial,
            "parallel" => RunningMode::Parallel { nthreads },
            _ => return Err(ctx.invalid(raw, "mode should be \"serial\" or \"parallel\"").into()),
        };
        self.value = Some(value);
        Ok(())
    }

    fn is_configured(&self) -> bool { self.value.is_some() }

    fn get_information(&self) -> String {
        format!("Running mode: {}", self.get_value())
    }

    fn as_any(&self) -> &dyn Any { self }
}
