use std::collections::BTreeSet;

use rhai::{
    Engine,
    Scope,
    INT,
};
use shared::warn;

use crate::trajectory::Universe;
use super::{
    Selector,
    WILDCARD,
};


/// Each criterion is a rhai script defining
///
/// ```rhai
/// fn select(name, element, index) {
///     element == "H" && index < 10
/// }
/// ```
///
/// called once per atom with its 0-based index. Atoms for which the script returns
/// `true` are selected. Scripts failing to compile or evaluate are skipped.
pub struct ScriptSelector {
    choices: Vec<String>,
    atoms: Vec<(String, String)>,
}


impl ScriptSelector {
    pub fn new(universe: &Universe) -> Self {
        Self {
            choices: vec![WILDCARD.to_string()],
            atoms: universe.atoms().iter()
                .map(|a| (a.name.clone(), a.element.clone()))
                .collect(),
        }
    }


    fn run_script(&self, engine: &Engine, src: &str) -> Result<BTreeSet<usize>, String> {
        let ast = engine.compile(src).map_err(|e| e.to_string())?;
        let mut scope = Scope::new();
        let mut ret = BTreeSet::new();

        for (i, (name, element)) in self.atoms.iter().enumerate() {
            let picked = engine.call_fn::<bool>(&mut scope, &ast, "select", (name.clone(), element.clone(), i as INT))
                .map_err(|e| format!("atom #{}: {}", i, e))?;
            if picked {
                ret.insert(i);
            }
        }
        Ok(ret)
    }
}


impl Selector for ScriptSelector {
    fn choices(&self) -> &[String] { &self.choices }

    fn select(&self, criteria: &[String]) -> BTreeSet<usize> {
        let engine = Engine::new();
        let mut ret = BTreeSet::new();

        for src in criteria {
            if src.trim() == WILDCARD {
                ret.extend(0 .. self.atoms.len());
                continue;
            }
            match self.run_script(&engine, src) {
                Ok(sel) => ret.extend(sel),
                Err(e) => warn!("Skipping selection script: {}", e),
            }
        }
        ret
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::trajectory::universe::tests::water_universe;

    #[test]
    fn test_script_selector() {
        let sel = ScriptSelector::new(&water_universe());

        let src = r#"fn select(name, element, index) { element == "H" && index < 3 }"#;
        assert_eq!(sel.select(&[src.to_string()]).into_iter().collect::<Vec<_>>(), vec![1, 2]);

        let src = r#"fn select(name, element, index) { name.starts_with("O") }"#;
        assert_eq!(sel.select(&[src.to_string()]).into_iter().collect::<Vec<_>>(), vec![0, 3]);

        assert!(sel.select(&["fn select(a, b) { true }".to_string()]).is_empty());
        assert!(sel.select(&["this is not rhai {".to_string()]).is_empty());
    }
}
