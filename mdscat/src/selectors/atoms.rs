use std::collections::BTreeSet;

use shared::{
    index_transform,
    range_parse,
    warn,
};

use crate::trajectory::Universe;
use super::{
    Selector,
    WILDCARD,
    lowercase_set,
    sorted_choices,
};


/// Every atom of the universe, criteria are ignored.
pub struct AllAtoms {
    choices: Vec<String>,
    natoms: usize,
}


impl AllAtoms {
    pub fn new(universe: &Universe) -> Self {
        Self {
            choices: vec![WILDCARD.to_string()],
            natoms: universe.natoms(),
        }
    }
}


impl Selector for AllAtoms {
    fn choices(&self) -> &[String] { &self.choices }

    fn select(&self, _criteria: &[String]) -> BTreeSet<usize> {
        (0 .. self.natoms).collect()
    }
}


/// 1-based atom indices written as ranges, e.g. `"1..3 7 -1"`. Negative indices count
/// from the end and `0` means every atom.
pub struct AtomIndex {
    choices: Vec<String>,
    natoms: usize,
}


impl AtomIndex {
    pub fn new(universe: &Universe) -> Self {
        let natoms = universe.natoms();
        Self {
            choices: std::iter::once(WILDCARD.to_string())
                .chain((1 ..= natoms).map(|i| i.to_string()))
                .collect(),
            natoms,
        }
    }
}


impl Selector for AtomIndex {
    fn choices(&self) -> &[String] { &self.choices }

    fn select(&self, criteria: &[String]) -> BTreeSet<usize> {
        let mut ret = BTreeSet::new();
        if self.natoms == 0 {
            return ret;
        }

        for c in criteria {
            if c.trim() == WILDCARD {
                ret.extend(0 .. self.natoms);
                continue;
            }
            let idx = match range_parse(c) {
                Ok(idx) => idx,
                Err(e) => {
                    warn!("Skipping atom index criterion '{}': {}", c, e);
                    continue;
                },
            };
            for i in index_transform(idx, self.natoms) {
                if (1 ..= self.natoms).contains(&i) {
                    ret.insert(i - 1);
                } else {
                    warn!("Atom index {} out of range 1..={}, skipped.", i, self.natoms);
                }
            }
        }
        ret
    }
}


/// Atoms whose name matches one of the criteria, case-insensitive.
pub struct AtomName {
    choices: Vec<String>,
    names: Vec<String>,
}


impl AtomName {
    pub fn new(universe: &Universe) -> Self {
        Self {
            choices: sorted_choices(universe.atoms().iter().map(|a| a.name.as_str())),
            names: universe.atoms().iter().map(|a| a.name.trim().to_lowercase()).collect(),
        }
    }
}


impl Selector for AtomName {
    fn choices(&self) -> &[String] { &self.choices }

    fn select(&self, criteria: &[String]) -> BTreeSet<usize> {
        select_by_label(&self.names, criteria)
    }
}


/// Atoms whose chemical element matches one of the criteria, case-insensitive.
pub struct AtomElement {
    choices: Vec<String>,
    elements: Vec<String>,
}


impl AtomElement {
    pub fn new(universe: &Universe) -> Self {
        Self {
            choices: sorted_choices(universe.atoms().iter().map(|a| a.element.as_str())),
            elements: universe.atoms().iter().map(|a| a.element.trim().to_lowercase()).collect(),
        }
    }
}


impl Selector for AtomElement {
    fn choices(&self) -> &[String] { &self.choices }

    fn select(&self, criteria: &[String]) -> BTreeSet<usize> {
        select_by_label(&self.elements, criteria)
    }
}


fn select_by_label(labels: &[String], criteria: &[String]) -> BTreeSet<usize> {
    let wanted = lowercase_set(criteria);
    if wanted.contains(WILDCARD) {
        return (0 .. labels.len()).collect();
    }
    labels.iter()
        .enumerate()
        .filter(|(_, l)| wanted.contains(l.as_str()))
        .map(|(i, _)| i)
        .collect()
}
