use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};

use crate::core::{
    value_as_f64,
    Configurator,
    ConfiguratorSpec,
    ResolveContext,
};
use crate::error::{ConfigurationError, Result};
use crate::selectors::SelectionExpr;
use crate::trajectory::{
    elements,
    GroupingLevel,
};
use super::TrajectoryConfigurator;


pub struct GroupingLevelConfigurator {
    spec: ConfiguratorSpec,
    value: Option<GroupingLevel>,
}


impl GroupingLevelConfigurator {
    pub fn new(spec: &ConfiguratorSpec) -> Result<Self, ConfigurationError> {
        spec.check_options(&[])?;
        Ok(Self { spec: spec.clone(), value: None })
    }

    pub fn get_value(&self) -> GroupingLevel {
        self.value.unwrap_or_default()
    }
}


impl Configurator for GroupingLevelConfigurator {
    fn spec(&self) -> &ConfiguratorSpec { &self.spec }

    fn default_value(&self) -> toml::Value {
        toml::Value::String(GroupingLevel::default().to_string())
    }

    fn configure(&mut self, raw: &toml::Value, ctx: &ResolveContext) -> Result<()> {
        let level = match raw.as_str().map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("atom") => GroupingLevel::Atom,
            Some("molecule") => GroupingLevel::Molecule,
            _ => return Err(ctx.invalid(raw, "expected \"atom\" or \"molecule\"").into()),
        };
        self.value = Some(level);
        Ok(())
    }

    fn is_configured(&self) -> bool { self.value.is_some() }

    fn get_information(&self) -> String {
        format!("Grouping level: {}", self.get_value())
    }

    fn as_any(&self) -> &dyn Any { self }
}


/// Atoms picked by a selection expression, split into groups at the configured
/// grouping level. Groups are the unit of work of the analyses.
pub struct AtomSelectionConfigurator {
    spec: ConfiguratorSpec,
    expr: Option<SelectionExpr>,
    indices: BTreeSet<usize>,
    groups: Vec<Vec<usize>>,
    elements: Vec<Vec<String>>,
}


impl AtomSelectionConfigurator {
    pub fn new(spec: &ConfiguratorSpec) -> Result<Self, ConfigurationError> {
        spec.check_options(&[])?;
        spec.check_dependencies(&["trajectory", "grouping_level"])?;
        Ok(Self {
            spec: spec.clone(),
            expr: None,
            indices: BTreeSet::new(),
            groups: vec![],
            elements: vec![],
        })
    }

    pub fn get_indices(&self) -> &BTreeSet<usize> { &self.indices }
    pub fn get_groups(&self) -> &[Vec<usize>] { &self.groups }
    /// Elements of the atoms of each group, before transmutation.
    pub fn get_elements(&self) -> &[Vec<String>] { &self.elements }
    pub fn n_groups(&self) -> usize { self.groups.len() }
    pub fn n_selected_atoms(&self) -> usize { self.indices.len() }
}


impl Configurator for AtomSelectionConfigurator {
    fn spec(&self) -> &ConfiguratorSpec { &self.spec }

    fn default_value(&self) -> toml::Value {
        SelectionExpr::All.to_value()
    }

    fn configure(&mut self, raw: &toml::Value, ctx: &ResolveContext) -> Result<()> {
        let traj = ctx.dependency::<TrajectoryConfigurator>("trajectory")?.get_instance()?;
        let level = ctx.dependency::<GroupingLevelConfigurator>("grouping_level")?.get_value();
        let universe = traj.get_universe();

        let expr = SelectionExpr::from_value(raw).map_err(|e| ctx.invalid(raw, e))?;
        let indices = expr.evaluate(universe, &ctx.plugins().selectors)
            .map_err(|e| ctx.invalid(raw, e))?;
        if indices.is_empty() {
            return Err(ctx.invalid(raw, "the selection is empty").into());
        }

        let groups = universe.group(&indices, level);
        self.elements = groups.iter()
            .map(|g| g.iter().map(|&i| universe.atoms()[i].element.clone()).collect())
            .collect();
        self.groups = groups;
        self.indices = indices;
        self.expr = Some(expr);
        Ok(())
    }

    fn is_configured(&self) -> bool { self.expr.is_some() }

    fn get_information(&self) -> String {
        format!("{} atoms selected in {} groups", self.indices.len(), self.groups.len())
    }

    fn as_any(&self) -> &dyn Any { self }
}


/// Element changes applied to parts of the selection, later entries win:
///
/// ```toml
/// transmutated_atoms = [{ element = "D", selection = { atom_element = ["H"] } }]
/// ```
///
/// Atoms outside the atom selection are left untouched.
pub struct AtomTransmutationConfigurator {
    spec: ConfiguratorSpec,
    value: BTreeMap<usize, String>,
    configured: bool,
}


impl AtomTransmutationConfigurator {
    pub fn new(spec: &ConfiguratorSpec) -> Result<Self, ConfigurationError> {
        spec.check_options(&[])?;
        spec.check_dependencies(&["trajectory", "atom_selection"])?;
        Ok(Self {
            spec: spec.clone(),
            value: BTreeMap::new(),
            configured: false,
        })
    }

    /// Atom index -> new element.
    pub fn get_value(&self) -> &BTreeMap<usize, String> { &self.value }

    pub fn element_of<'a>(&'a self, iatom: usize, original: &'a str) -> &'a str {
        self.value.get(&iatom).map(|s| s.as_str()).unwrap_or(original)
    }
}


impl Configurator for AtomTransmutationConfigurator {
    fn spec(&self) -> &ConfiguratorSpec { &self.spec }

    fn default_value(&self) -> toml::Value {
        toml::Value::Array(vec![])
    }

    fn configure(&mut self, raw: &toml::Value, ctx: &ResolveContext) -> Result<()> {
        let traj = ctx.dependency::<TrajectoryConfigurator>("trajectory")?.get_instance()?;
        let selected = ctx.dependency::<AtomSelectionConfigurator>("atom_selection")?.get_indices();

        let entries = raw.as_array().ok_or_else(|| ctx.invalid(raw, "expected a list of { element, selection }"))?;
        let mut value = BTreeMap::new();
        for entry in entries {
            let t = entry.as_table()
                .filter(|t| t.len() == 2)
                .ok_or_else(|| ctx.invalid(entry, "expected { element = ..., selection = ... }"))?;
            let element = t.get("element")
                .and_then(|e| e.as_str())
                .ok_or_else(|| ctx.invalid(entry, "'element' should be a string"))?;
            let element = elements::element(element)
                .ok_or_else(|| ctx.invalid(entry, format!("unknown element '{}'", element)))?
                .symbol;
            let expr = t.get("selection")
                .ok_or_else(|| ctx.invalid(entry, "'selection' is missing"))
                .and_then(|s| SelectionExpr::from_value(s).map_err(|e| ctx.invalid(entry, e)))?;
            let atoms = expr.evaluate(traj.get_universe(), &ctx.plugins().selectors)
                .map_err(|e| ctx.invalid(entry, e))?;

            for i in atoms.intersection(selected) {
                value.insert(*i, element.to_string());
            }
        }

        self.value = value;
        self.configured = true;
        Ok(())
    }

    fn is_configured(&self) -> bool { self.configured }

    fn get_information(&self) -> String {
        format!("{} atoms transmutated", self.value.len())
    }

    fn as_any(&self) -> &dyn Any { self }
}


/// Selection groups seen by the analyses: the chemical category of a group is the
/// element of its first atom, after transmutation.
#[derive(Clone, Debug, PartialEq)]
pub struct SelectionGroups {
    pub groups: Vec<Vec<usize>>,
    pub group_elements: Vec<String>,
    /// Number of groups per element.
    pub n_per_element: BTreeMap<String, usize>,
}


impl SelectionGroups {
    pub fn new(selection: &AtomSelectionConfigurator, transmutation: Option<&AtomTransmutationConfigurator>) -> Self {
        let groups = selection.get_groups().to_vec();
        let group_elements = groups.iter()
            .zip(selection.get_elements())
            .map(|(g, els)| {
                let (iatom, element) = (g[0], els[0].as_str());
                transmutation
                    .map(|t| t.element_of(iatom, element))
                    .unwrap_or(element)
                    .to_string()
            })
            .collect::<Vec<_>>();

        let mut n_per_element = BTreeMap::new();
        for el in group_elements.iter() {
            *n_per_element.entry(el.clone()).or_insert(0) += 1;
        }

        Self { groups, group_elements, n_per_element }
    }

    pub fn elements(&self) -> impl Iterator<Item = &str> {
        self.n_per_element.keys().map(|k| k.as_str())
    }
}


/// Weighting of the per-element partial results in the totals. The raw value is a
/// property name of the element table or an explicit `{ element = value }` table.
/// The weight of element `e` is `n_e p_e / sum(n p)`.
pub struct WeightsConfigurator {
    spec: ConfiguratorSpec,
    default: String,
    property: String,
    weights: BTreeMap<String, f64>,
    configured: bool,
}


impl WeightsConfigurator {
    pub fn new(spec: &ConfiguratorSpec) -> Result<Self, ConfigurationError> {
        spec.check_options(&["default"])?;
        spec.check_dependencies(&["atom_selection"])?;
        let default = spec.opt_str("default")?.unwrap_or("equal").to_string();
        if !elements::PROPERTY_NAMES.contains(&default.as_str()) {
            return Err(ConfigurationError::definition(&spec.name,
                    format!("default '{}' is not one of {:?}", default, elements::PROPERTY_NAMES)));
        }
        Ok(Self {
            spec: spec.clone(),
            default,
            property: String::new(),
            weights: BTreeMap::new(),
            configured: false,
        })
    }

    /// Property name, `"custom"` for explicit tables.
    pub fn get_property(&self) -> &str { &self.property }

    /// Normalized weight per element.
    pub fn get_weights(&self) -> &BTreeMap<String, f64> { &self.weights }

    pub fn get_weight(&self, element: &str) -> f64 {
        self.weights.get(element).copied().unwrap_or(0.0)
    }
}


impl Configurator for WeightsConfigurator {
    fn spec(&self) -> &ConfiguratorSpec { &self.spec }

    fn default_value(&self) -> toml::Value {
        toml::Value::String(self.default.clone())
    }

    fn configure(&mut self, raw: &toml::Value, ctx: &ResolveContext) -> Result<()> {
        let selection = ctx.dependency::<AtomSelectionConfigurator>("atom_selection")?;
        let transmutation = ctx.optional_dependency::<AtomTransmutationConfigurator>("transmutation")?;
        let groups = SelectionGroups::new(selection, transmutation);

        let (property, props) = match raw {
            toml::Value::String(name) => {
                if !elements::PROPERTY_NAMES.contains(&name.as_str()) {
                    return Err(ctx.invalid(raw, format!("unknown property, use one of {:?}", elements::PROPERTY_NAMES)).into());
                }
                let props = groups.elements()
                    .map(|el| elements::property(el, name)
                        .map(|p| (el.to_string(), p))
                        .ok_or_else(|| ctx.invalid(raw, format!("no '{}' for element '{}'", name, el))))
                    .collect::<std::result::Result<BTreeMap<_, _>, _>>()?;
                (name.clone(), props)
            },
            toml::Value::Table(t) => {
                let props = groups.elements()
                    .map(|el| t.iter()
                        .find(|(k, _)| k.eq_ignore_ascii_case(el))
                        .and_then(|(_, v)| value_as_f64(v))
                        .map(|p| (el.to_string(), p))
                        .ok_or_else(|| ctx.invalid(raw, format!("no numeric weight for element '{}'", el))))
                    .collect::<std::result::Result<BTreeMap<_, _>, _>>()?;
                ("custom".to_string(), props)
            },
            _ => return Err(ctx.invalid(raw, "expected a property name or { element = value } table").into()),
        };

        let total = groups.n_per_element.iter()
            .map(|(el, &n)| n as f64 * props[el])
            .sum::<f64>();
        if total.abs() < 1E-12 {
            return Err(ctx.invalid(raw, "the weights sum to zero over the selection").into());
        }

        self.weights = groups.n_per_element.iter()
            .map(|(el, &n)| (el.clone(), n as f64 * props[el] / total))
            .collect();
        self.property = property;
        self.configured = true;
        Ok(())
    }

    fn is_configured(&self) -> bool { self.configured }

    fn get_information(&self) -> String {
        let ws = self.weights.iter()
            .map(|(el, w)| format!("{}: {:.6}", el, w))
            .collect::<Vec<_>>()
            .join(", ");
        format!("Weights ({}): {}", self.property, ws)
    }

    fn as_any(&self) -> &dyn Any { self }
}
