//! Atom selectors: predicates turning criteria into sets of atom indices over a
//! [`Universe`], and the set algebra composing them.

use std::collections::BTreeSet;
use std::fmt;

use crate::core::Registry;
use crate::trajectory::Universe;

mod atoms;
mod objects;
mod script;

pub use atoms::{
    AllAtoms,
    AtomElement,
    AtomIndex,
    AtomName,
};
pub use objects::{
    MoleculeName,
    ResidueName,
};
pub use script::ScriptSelector;


/// Wildcard criterion selecting every atom.
pub const WILDCARD: &str = "*";


/// Selector built once from a universe. Selection is best effort: malformed criteria
/// and objects without the relevant attribute are skipped.
pub trait Selector: Send + Sync {
    /// Values a front end may offer, sorted, the wildcard first.
    fn choices(&self) -> &[String];

    fn select(&self, criteria: &[String]) -> BTreeSet<usize>;
}


pub type SelectorFactory = fn(&Universe) -> Box<dyn Selector>;


pub fn register_all(registry: &mut Registry<SelectorFactory>) {
    registry.register("all", |u| Box::new(AllAtoms::new(u)));
    registry.register("atom_index", |u| Box::new(AtomIndex::new(u)));
    registry.register("atom_name", |u| Box::new(AtomName::new(u)));
    registry.register("atom_element", |u| Box::new(AtomElement::new(u)));
    registry.register("molecule_name", |u| Box::new(MoleculeName::new(u)));
    registry.register("residue_name", |u| Box::new(ResidueName::new(u)));
    registry.register("script", |u| Box::new(ScriptSelector::new(u)));
}


pub(crate) fn sorted_choices<'a, I>(values: I) -> Vec<String>
where I: Iterator<Item = &'a str> {
    let set = values.map(|v| v.trim().to_string()).collect::<BTreeSet<_>>();
    std::iter::once(WILDCARD.to_string()).chain(set).collect()
}


pub(crate) fn lowercase_set(criteria: &[String]) -> BTreeSet<String> {
    criteria.iter().map(|c| c.trim().to_lowercase()).collect()
}


/// Selection expression as written in input files:
///
/// ```toml
/// atom_selection = "all"
/// atom_selection = { atom_element = ["H", "O"] }
/// atom_selection = { difference = [{ molecule_name = ["*"] }, { atom_name = ["HW2"] }] }
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum SelectionExpr {
    All,
    Selector { kind: String, criteria: Vec<String> },
    Union(Vec<SelectionExpr>),
    Intersection(Vec<SelectionExpr>),
    /// First operand minus all the following ones.
    Difference(Vec<SelectionExpr>),
}


impl SelectionExpr {
    pub fn from_value(v: &toml::Value) -> Result<Self, String> {
        match v {
            toml::Value::String(s) if s == "all" || s == WILDCARD => Ok(Self::All),
            toml::Value::String(s) => Err(format!("'{}' is not a selection, use \"all\" or a table", s)),
            toml::Value::Table(t) => {
                if t.len() != 1 {
                    return Err(format!("a selection table should have exactly one key, got {}", t.len()));
                }
                let Some((key, val)) = t.iter().next() else {
                    return Err("empty selection table".to_string());
                };
                match key.as_str() {
                    "union" | "intersection" | "difference" => {
                        let operands = val.as_array()
                            .ok_or_else(|| format!("'{}' expects a list of selections", key))?
                            .iter()
                            .map(Self::from_value)
                            .collect::<Result<Vec<_>, _>>()?;
                        if operands.is_empty() {
                            return Err(format!("'{}' needs at least one operand", key));
                        }
                        Ok(match key.as_str() {
                            "union" => Self::Union(operands),
                            "intersection" => Self::Intersection(operands),
                            _ => Self::Difference(operands),
                        })
                    },
                    kind => {
                        let criteria = match val {
                            toml::Value::Array(a) => a.iter().map(criterion).collect::<Result<Vec<_>, _>>()?,
                            other => vec![criterion(other)?],
                        };
                        Ok(Self::Selector { kind: kind.to_string(), criteria })
                    },
                }
            },
            other => Err(format!("invalid selection {}", other)),
        }
    }


    pub fn to_value(&self) -> toml::Value {
        let table = |key: &str, val: toml::Value| {
            let mut t = toml::Table::new();
            t.insert(key.to_string(), val);
            toml::Value::Table(t)
        };
        let list = |xs: &[SelectionExpr]| toml::Value::Array(xs.iter().map(|x| x.to_value()).collect());

        match self {
            Self::All => toml::Value::String("all".to_string()),
            Self::Selector { kind, criteria } => table(kind,
                toml::Value::Array(criteria.iter().map(|c| toml::Value::String(c.clone())).collect())),
            Self::Union(xs) => table("union", list(xs)),
            Self::Intersection(xs) => table("intersection", list(xs)),
            Self::Difference(xs) => table("difference", list(xs)),
        }
    }


    /// Unknown selector kinds are errors, everything below the selector level is best
    /// effort.
    pub fn evaluate(&self, universe: &Universe, selectors: &Registry<SelectorFactory>) -> Result<BTreeSet<usize>, String> {
        match self {
            Self::All => Ok(universe.all_atoms()),
            Self::Selector { kind, criteria } => {
                let factory = selectors.get(kind)
                    .ok_or_else(|| format!("unknown selector '{}', available: {:?}", kind, selectors.names().collect::<Vec<_>>()))?;
                Ok(factory(universe).select(criteria))
            },
            Self::Union(xs) => {
                let mut ret = BTreeSet::new();
                for x in xs {
                    ret.extend(x.evaluate(universe, selectors)?);
                }
                Ok(ret)
            },
            Self::Intersection(xs) => {
                let mut it = xs.iter();
                let mut ret = match it.next() {
                    Some(x) => x.evaluate(universe, selectors)?,
                    None => return Ok(BTreeSet::new()),
                };
                for x in it {
                    let other = x.evaluate(universe, selectors)?;
                    ret.retain(|i| other.contains(i));
                }
                Ok(ret)
            },
            Self::Difference(xs) => {
                let mut it = xs.iter();
                let mut ret = match it.next() {
                    Some(x) => x.evaluate(universe, selectors)?,
                    None => return Ok(BTreeSet::new()),
                };
                for x in it {
                    for i in x.evaluate(universe, selectors)? {
                        ret.remove(&i);
                    }
                }
                Ok(ret)
            },
        }
    }
}


fn criterion(v: &toml::Value) -> Result<String, String> {
    match v {
        toml::Value::String(s) => Ok(s.clone()),
        toml::Value::Integer(i) => Ok(i.to_string()),
        other => Err(format!("invalid selection criterion {}", other)),
    }
}


impl fmt::Display for SelectionExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_value())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::trajectory::universe::tests::water_universe;

    fn registry() -> Registry<SelectorFactory> {
        let mut r = Registry::new("selector");
        register_all(&mut r);
        r
    }

    fn select(expr: &str) -> Result<Vec<usize>, String> {
        let v: toml::Table = toml::from_str(&format!("sel = {}", expr)).unwrap();
        let expr = SelectionExpr::from_value(&v["sel"])?;
        expr.evaluate(&water_universe(), &registry())
            .map(|s| s.into_iter().collect())
    }

    #[test]
    fn test_molecule_name_selector() {
        let u = water_universe();
        let sel = MoleculeName::new(&u);
        assert_eq!(sel.choices(), &["*", "Water"]);
        assert_eq!(sel.select(&["*".into()]), u.all_atoms());
        assert_eq!(sel.select(&["WATER".into()]).into_iter().collect::<Vec<_>>(), vec![0, 1, 2, 3, 4, 5]);
        assert!(sel.select(&["Methanol".into()]).is_empty());
    }

    #[test]
    fn test_residue_wildcard_selects_every_atom() {
        let u = water_universe();
        let sel = ResidueName::new(&u);
        assert_eq!(sel.select(&["*".into()]), u.all_atoms());
        assert_eq!(sel.select(&["SOL".into()]).into_iter().collect::<Vec<_>>(), vec![0, 1, 2, 3, 4, 5]);
        assert!(sel.select(&["ar".into()]).is_empty());
    }

    #[test]
    fn test_expressions() {
        assert_eq!(select(r#""all""#).unwrap().len(), 7);
        assert_eq!(select(r#"{ atom_element = ["h"] }"#).unwrap(), vec![1, 2, 4, 5]);
        assert_eq!(select(r#"{ atom_index = "1 -1" }"#).unwrap(), vec![0, 6]);
        assert_eq!(select(r#"{ union = [{ atom_name = ["OW"] }, { atom_element = ["Ar"] }] }"#).unwrap(), vec![0, 3, 6]);
        assert_eq!(select(r#"{ intersection = [{ molecule_name = ["water"] }, { atom_name = ["HW2"] }] }"#).unwrap(), vec![2, 5]);
        assert_eq!(select(r#"{ difference = [{ residue_name = ["*"] }, { atom_element = ["H"] }] }"#).unwrap(), vec![0, 3, 6]);
        assert_eq!(select(r#"{ residue_name = ["sol"] }"#).unwrap(), vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_invalid_expressions() {
        assert!(select(r#""everything""#).is_err());
        assert!(select(r#"{ no_such_selector = ["x"] }"#).is_err());
        assert!(select(r#"{ union = [] }"#).is_err());
        assert!(select(r#"{ atom_name = ["OW"], atom_element = ["H"] }"#).is_err());
    }

    #[test]
    fn test_to_value() {
        let v: toml::Table = toml::from_str(r#"sel = { union = [{ atom_name = ["OW"] }, "all"] }"#).unwrap();
        let expr = SelectionExpr::from_value(&v["sel"]).unwrap();
        assert_eq!(SelectionExpr::from_value(&expr.to_value()).unwrap(), expr);
    }
}
