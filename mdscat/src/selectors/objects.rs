use std::collections::BTreeSet;

use crate::trajectory::{
    ChemicalObject,
    Universe,
};
use super::{
    Selector,
    WILDCARD,
    lowercase_set,
    sorted_choices,
};


/// Atoms of the objects whose name, as returned by `name_of`, matches a criterion.
/// Objects where `name_of` returns `None` are ignored. The wildcard selects every atom
/// of the universe.
struct ByObjectName {
    choices: Vec<String>,
    objects: Vec<(String, Vec<usize>)>,
    natoms: usize,
}


impl ByObjectName {
    fn new(universe: &Universe, name_of: fn(&ChemicalObject) -> Option<&str>) -> Self {
        let objects = universe.objects().iter()
            .filter_map(|o| name_of(o).map(|n| (n.to_string(), o.atoms().to_vec())))
            .collect::<Vec<_>>();
        Self {
            choices: sorted_choices(objects.iter().map(|(n, _)| n.as_str())),
            objects: objects.into_iter()
                .map(|(n, atoms)| (n.trim().to_lowercase(), atoms))
                .collect(),
            natoms: universe.natoms(),
        }
    }


    fn select(&self, criteria: &[String]) -> BTreeSet<usize> {
        let wanted = lowercase_set(criteria);
        if wanted.contains(WILDCARD) {
            return (0 .. self.natoms).collect();
        }
        self.objects.iter()
            .filter(|(n, _)| wanted.contains(n.as_str()))
            .flat_map(|(_, atoms)| atoms.iter().copied())
            .collect()
    }
}


/// Atoms of the molecules with the given names. The wildcard selects every atom of
/// the universe.
pub struct MoleculeName {
    inner: ByObjectName,
}


impl MoleculeName {
    pub fn new(universe: &Universe) -> Self {
        Self {
            inner: ByObjectName::new(universe, ChemicalObject::molecule_name),
        }
    }
}


impl Selector for MoleculeName {
    fn choices(&self) -> &[String] { &self.inner.choices }

    fn select(&self, criteria: &[String]) -> BTreeSet<usize> {
        self.inner.select(criteria)
    }
}


/// Atoms of the residues with the given names. The wildcard selects every atom of the
/// universe, including atoms outside any residue.
pub struct ResidueName {
    inner: ByObjectName,
}


impl ResidueName {
    pub fn new(universe: &Universe) -> Self {
        Self {
            inner: ByObjectName::new(universe, ChemicalObject::residue_name),
        }
    }
}


impl Selector for ResidueName {
    fn choices(&self) -> &[String] { &self.inner.choices }

    fn select(&self, criteria: &[String]) -> BTreeSet<usize> {
        self.inner.select(criteria)
    }
}
