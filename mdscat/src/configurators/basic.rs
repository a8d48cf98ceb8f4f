use std::any::Any;

use crate::core::{
    value_as_f64,
    Configurator,
    ConfiguratorSpec,
    ResolveContext,
};
use crate::error::{ConfigurationError, Result};


pub struct BooleanConfigurator {
    spec: ConfiguratorSpec,
    default: bool,
    value: Option<bool>,
}


impl BooleanConfigurator {
    pub fn new(spec: &ConfiguratorSpec) -> Result<Self, ConfigurationError> {
        spec.check_options(&["default"])?;
        Ok(Self {
            spec: spec.clone(),
            default: spec.opt_bool("default")?.unwrap_or(false),
            value: None,
        })
    }

    pub fn get_value(&self) -> bool {
        self.value.unwrap_or(self.default)
    }
}


impl Configurator for BooleanConfigurator {
    fn spec(&self) -> &ConfiguratorSpec { &self.spec }

    fn default_value(&self) -> toml::Value {
        toml::Value::Boolean(self.default)
    }

    fn configure(&mut self, raw: &toml::Value, ctx: &ResolveContext) -> Result<()> {
        let v = raw.as_bool().ok_or_else(|| ctx.invalid(raw, "expected a boolean"))?;
        self.value = Some(v);
        Ok(())
    }

    fn is_configured(&self) -> bool { self.value.is_some() }

    fn get_information(&self) -> String {
        format!("{}: {}", self.spec.label, self.get_value())
    }

    fn as_any(&self) -> &dyn Any { self }
}


/// Integer with optional bounds `mini`, `maxi` (inclusive) and an optional list of
/// allowed `choices`.
pub struct IntegerConfigurator {
    spec: ConfiguratorSpec,
    default: i64,
    mini: Option<i64>,
    maxi: Option<i64>,
    choices: Option<Vec<i64>>,
    value: Option<i64>,
}


impl IntegerConfigurator {
    pub fn new(spec: &ConfiguratorSpec) -> Result<Self, ConfigurationError> {
        spec.check_options(&["default", "mini", "maxi", "choices"])?;
        let choices = spec.option("choices")
            .map(|v| v.as_array()
                .and_then(|a| a.iter().map(|x| x.as_integer()).collect::<Option<Vec<_>>>())
                .ok_or_else(|| ConfigurationError::definition(&spec.name, "option 'choices' should be a list of integers")))
            .transpose()?;

        let ret = Self {
            spec: spec.clone(),
            default: spec.opt_i64("default")?.unwrap_or(0),
            mini: spec.opt_i64("mini")?,
            maxi: spec.opt_i64("maxi")?,
            choices,
            value: None,
        };
        if let Err(reason) = ret.check(ret.default) {
            return Err(ConfigurationError::definition(&spec.name, format!("default value: {}", reason)));
        }
        Ok(ret)
    }

    fn check(&self, v: i64) -> std::result::Result<(), String> {
        if let Some(m) = self.mini.filter(|&m| v < m) {
            return Err(format!("should be >= {}", m));
        }
        if let Some(m) = self.maxi.filter(|&m| v > m) {
            return Err(format!("should be <= {}", m));
        }
        if let Some(c) = self.choices.as_ref().filter(|c| !c.contains(&v)) {
            return Err(format!("should be one of {:?}", c));
        }
        Ok(())
    }

    pub fn get_value(&self) -> i64 {
        self.value.unwrap_or(self.default)
    }
}


impl Configurator for IntegerConfigurator {
    fn spec(&self) -> &ConfiguratorSpec { &self.spec }

    fn default_value(&self) -> toml::Value {
        toml::Value::Integer(self.default)
    }

    fn configure(&mut self, raw: &toml::Value, ctx: &ResolveContext) -> Result<()> {
        let v = raw.as_integer().ok_or_else(|| ctx.invalid(raw, "expected an integer"))?;
        self.check(v).map_err(|reason| ctx.invalid(raw, reason))?;
        self.value = Some(v);
        Ok(())
    }

    fn is_configured(&self) -> bool { self.value.is_some() }

    fn get_information(&self) -> String {
        format!("{}: {}", self.spec.label, self.get_value())
    }

    fn as_any(&self) -> &dyn Any { self }
}


/// Float with optional inclusive bounds `mini` and `maxi`. Integers are accepted.
pub struct FloatConfigurator {
    spec: ConfiguratorSpec,
    default: f64,
    mini: Option<f64>,
    maxi: Option<f64>,
    value: Option<f64>,
}


impl FloatConfigurator {
    pub fn new(spec: &ConfiguratorSpec) -> Result<Self, ConfigurationError> {
        spec.check_options(&["default", "mini", "maxi"])?;
        let ret = Self {
            spec: spec.clone(),
            default: spec.opt_f64("default")?.unwrap_or(0.0),
            mini: spec.opt_f64("mini")?,
            maxi: spec.opt_f64("maxi")?,
            value: None,
        };
        if let Err(reason) = ret.check(ret.default) {
            return Err(ConfigurationError::definition(&spec.name, format!("default value: {}", reason)));
        }
        Ok(ret)
    }

    fn check(&self, v: f64) -> std::result::Result<(), String> {
        if !v.is_finite() {
            return Err("should be finite".to_string());
        }
        if let Some(m) = self.mini.filter(|&m| v < m) {
            return Err(format!("should be >= {}", m));
        }
        if let Some(m) = self.maxi.filter(|&m| v > m) {
            return Err(format!("should be <= {}", m));
        }
        Ok(())
    }

    pub fn get_value(&self) -> f64 {
        self.value.unwrap_or(self.default)
    }
}


impl Configurator for FloatConfigurator {
    fn spec(&self) -> &ConfiguratorSpec { &self.spec }

    fn default_value(&self) -> toml::Value {
        toml::Value::Float(self.default)
    }

    fn configure(&mut self, raw: &toml::Value, ctx: &ResolveContext) -> Result<()> {
        let v = value_as_f64(raw).ok_or_else(|| ctx.invalid(raw, "expected a number"))?;
        self.check(v).map_err(|reason| ctx.invalid(raw, reason))?;
        self.value = Some(v);
        Ok(())
    }

    fn is_configured(&self) -> bool { self.value.is_some() }

    fn get_information(&self) -> String {
        format!("{}: {}", self.spec.label, self.get_value())
    }

    fn as_any(&self) -> &dyn Any { self }
}


/// One string out of the non-empty `choices` option, the first choice by default.
pub struct SingleChoiceConfigurator {
    spec: ConfiguratorSpec,
    choices: Vec<String>,
    default: String,
    value: Option<String>,
}


impl SingleChoiceConfigurator {
    pub fn new(spec: &ConfiguratorSpec) -> Result<Self, ConfigurationError> {
        spec.check_options(&["choices", "default"])?;
        let choices = spec.opt_str_list("choices")?
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ConfigurationError::definition(&spec.name, "option 'choices' is required and cannot be empty"))?;
        let default = match spec.opt_str("default")? {
            Some(d) if choices.iter().any(|c| c == d) => d.to_string(),
            Some(d) => return Err(ConfigurationError::definition(&spec.name,
                    format!("default '{}' is not one of {:?}", d, choices))),
            None => choices[0].clone(),
        };
        Ok(Self {
            spec: spec.clone(),
            choices,
            default,
            value: None,
        })
    }

    pub fn get_choices(&self) -> &[String] {
        &self.choices
    }

    pub fn get_value(&self) -> &str {
        self.value.as_deref().unwrap_or(&self.default)
    }
}


impl Configurator for SingleChoiceConfigurator {
    fn spec(&self) -> &ConfiguratorSpec { &self.spec }

    fn default_value(&self) -> toml::Value {
        toml::Value::String(self.default.clone())
    }

    fn configure(&mut self, raw: &toml::Value, ctx: &ResolveContext) -> Result<()> {
        let v = raw.as_str().ok_or_else(|| ctx.invalid(raw, "expected a string"))?;
        if !self.choices.iter().any(|c| c == v) {
            return Err(ctx.invalid(raw, format!("should be one of {:?}", self.choices)).into());
        }
        self.value = Some(v.to_string());
        Ok(())
    }

    fn is_configured(&self) -> bool { self.value.is_some() }

    fn get_information(&self) -> String {
        format!("{}: {}", self.spec.label, self.get_value())
    }

    fn as_any(&self) -> &dyn Any { self }
}


#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RangeType {
    Integer,
    Float,
}


/// Upper bound on the number of values of a range, unless the `maxi_count` option says
/// otherwise.
pub const RANGE_MAXI_COUNT: usize = 1_000_000;


/// `[first, last, step]` expanded to `first, first + step, ...` below `last`, or up to
/// `last` included with `include_last`. Bounds `mini`/`maxi` apply to every value and
/// at most `maxi_count` values are produced.
pub struct RangeConfigurator {
    spec: ConfiguratorSpec,
    value_type: RangeType,
    include_last: bool,
    mini: Option<f64>,
    maxi: Option<f64>,
    maxi_count: usize,
    default: [f64; 3],
    values: Vec<f64>,
    configured: bool,
}


impl RangeConfigurator {
    pub fn new(spec: &ConfiguratorSpec) -> Result<Self, ConfigurationError> {
        spec.check_options(&["value_type", "include_last", "mini", "maxi", "maxi_count", "default"])?;
        let value_type = match spec.opt_str("value_type")?.unwrap_or("integer") {
            "integer" | "int" => RangeType::Integer,
            "float" => RangeType::Float,
            other => return Err(ConfigurationError::definition(&spec.name,
                    format!("option 'value_type' should be 'integer' or 'float', got '{}'", other))),
        };
        let default = match spec.option("default") {
            Some(v) => parse_triplet(v, value_type)
                .map_err(|e| ConfigurationError::definition(&spec.name, format!("default value: {}", e)))?,
            None => [0.0, 10.0, 1.0],
        };
        let maxi_count = match spec.opt_i64("maxi_count")? {
            Some(n) if n >= 1 => n as usize,
            Some(_) => return Err(ConfigurationError::definition(&spec.name, "option 'maxi_count' should be positive")),
            None => RANGE_MAXI_COUNT,
        };
        Ok(Self {
            spec: spec.clone(),
            value_type,
            include_last: spec.opt_bool("include_last")?.unwrap_or(false),
            mini: spec.opt_f64("mini")?,
            maxi: spec.opt_f64("maxi")?,
            maxi_count,
            default,
            values: vec![],
            configured: false,
        })
    }


    fn expand(&self, [first, last, step]: [f64; 3]) -> std::result::Result<Vec<f64>, String> {
        if ![first, last, step].iter().all(|x| x.is_finite()) {
            return Err("first, last and step should be finite".to_string());
        }
        if step <= 0.0 {
            return Err("step should be positive".to_string());
        }
        if last < first {
            return Err("last is lower than first".to_string());
        }

        let eps = step * 1E-9;
        let too_many = || format!("the range holds more than {} values", self.maxi_count);
        // `n` may count `last` which is dropped below without `include_last`.
        let n = ((last - first) / step + eps).floor() + 1.0;
        if n > (self.maxi_count + 1) as f64 {
            return Err(too_many());
        }
        let n = n as usize;
        let ret = (0 .. n)
            .map(|i| first + i as f64 * step)
            .filter(|&v| if self.include_last { v <= last + eps } else { v < last - eps })
            .collect::<Vec<_>>();

        if ret.is_empty() {
            return Err("the range is empty".to_string());
        }
        if ret.len() > self.maxi_count {
            return Err(too_many());
        }
        if let Some(m) = self.mini.filter(|&m| ret[0] < m) {
            return Err(format!("values should be >= {}", m));
        }
        if let Some(m) = self.maxi.filter(|&m| ret[ret.len() - 1] > m) {
            return Err(format!("values should be <= {}", m));
        }
        Ok(ret)
    }


    pub fn get_values(&self) -> &[f64] { &self.values }
    pub fn get_value_type(&self) -> RangeType { self.value_type }
    pub fn number(&self) -> usize { self.values.len() }

    pub fn first(&self) -> f64 {
        self.values.first().copied().unwrap_or(self.default[0])
    }

    pub fn last(&self) -> f64 {
        self.values.last().copied().unwrap_or(self.default[1])
    }
}


fn parse_triplet(v: &toml::Value, value_type: RangeType) -> std::result::Result<[f64; 3], String> {
    let a = v.as_array()
        .filter(|a| a.len() == 3)
        .ok_or_else(|| "expected [first, last, step]".to_string())?;
    let mut ret = [0.0; 3];
    for (r, x) in ret.iter_mut().zip(a.iter()) {
        *r = match (value_type, x) {
            (RangeType::Integer, toml::Value::Integer(i)) => *i as f64,
            (RangeType::Integer, _) => return Err(format!("{} is not an integer", x)),
            (RangeType::Float, x) => value_as_f64(x).ok_or_else(|| format!("{} is not a number", x))?,
        };
    }
    Ok(ret)
}


impl Configurator for RangeConfigurator {
    fn spec(&self) -> &ConfiguratorSpec { &self.spec }

    fn default_value(&self) -> toml::Value {
        let [first, last, step] = self.default;
        let to_value = |x: f64| match self.value_type {
            RangeType::Integer => toml::Value::Integer(x as i64),
            RangeType::Float => toml::Value::Float(x),
        };
        toml::Value::Array(vec![to_value(first), to_value(last), to_value(step)])
    }

    fn configure(&mut self, raw: &toml::Value, ctx: &ResolveContext) -> Result<()> {
        let triplet = parse_triplet(raw, self.value_type).map_err(|e| ctx.invalid(raw, e))?;
        self.values = self.expand(triplet).map_err(|e| ctx.invalid(raw, e))?;
        self.configured = true;
        Ok(())
    }

    fn is_configured(&self) -> bool { self.configured }

    fn get_information(&self) -> String {
        format!("{}: {} values from {} to {}", self.spec.label, self.number(), self.first(), self.last())
    }

    fn as_any(&self) -> &dyn Any { self }
}
