use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};


#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Atom {
    pub name: String,
    pub element: String,
}


#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Atom,
    Molecule,
    Residue,
}


impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Atom => "atom",
            Self::Molecule => "molecule",
            Self::Residue => "residue",
        }
    }
}


impl FromStr for ObjectKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "atom" => Ok(Self::Atom),
            "molecule" => Ok(Self::Molecule),
            "residue" => Ok(Self::Residue),
            _ => Err(Error::trajectory(format!("unknown chemical object kind '{}'", s))),
        }
    }
}


/// Closed set of selectable chemical objects. Each variant exposes the atoms it
/// contains, name accessors return `None` for the kinds without that attribute.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChemicalObject {
    Atom(usize),
    Molecule { name: String, atoms: Vec<usize> },
    Residue { name: String, atoms: Vec<usize> },
}


impl ChemicalObject {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::Atom(_) => ObjectKind::Atom,
            Self::Molecule { .. } => ObjectKind::Molecule,
            Self::Residue { .. } => ObjectKind::Residue,
        }
    }

    pub fn atoms(&self) -> &[usize] {
        match self {
            Self::Atom(i) => std::slice::from_ref(i),
            Self::Molecule { atoms, .. } | Self::Residue { atoms, .. } => atoms,
        }
    }

    pub fn molecule_name(&self) -> Option<&str> {
        match self {
            Self::Molecule { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn residue_name(&self) -> Option<&str> {
        match self {
            Self::Residue { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Name stored with the object, the atom name for single atoms.
    pub fn name<'a>(&'a self, universe: &'a Universe) -> &'a str {
        match self {
            Self::Atom(i) => &universe.atoms[*i].name,
            Self::Molecule { name, .. } | Self::Residue { name, .. } => name,
        }
    }
}


#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum GroupingLevel {
    #[default]
    Atom,
    Molecule,
}


impl fmt::Display for GroupingLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Atom => write!(f, "atom"),
            Self::Molecule => write!(f, "molecule"),
        }
    }
}


/// Static structure of a trajectory: the atoms and the chemical objects built on them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Universe {
    atoms: Vec<Atom>,
    objects: Vec<ChemicalObject>,
    molecule_of: Vec<Option<usize>>,
}


impl Universe {
    /// Atoms not covered by any molecule or residue get their own `Atom` object.
    pub fn new(atoms: Vec<Atom>, mut objects: Vec<ChemicalObject>) -> Result<Self> {
        let natoms = atoms.len();
        let mut covered = vec![false; natoms];
        let mut molecule_of = vec![None; natoms];

        for (iobj, obj) in objects.iter().enumerate() {
            for &i in obj.atoms() {
                if i >= natoms {
                    return Err(Error::trajectory(format!("object #{} refers to atom {} out of {} atoms", iobj, i, natoms)));
                }
                covered[i] = true;
                if obj.kind() == ObjectKind::Molecule {
                    if molecule_of[i].is_some() {
                        return Err(Error::trajectory(format!("atom {} belongs to more than one molecule", i)));
                    }
                    molecule_of[i] = Some(iobj);
                }
            }
        }

        objects.extend((0 .. natoms).filter(|&i| !covered[i]).map(ChemicalObject::Atom));

        Ok(Self {
            atoms,
            objects,
            molecule_of,
        })
    }


    /// Universe made of free atoms only, as loaded from formats without topology.
    pub fn from_elements(elements: &[String]) -> Self {
        let atoms = elements.iter()
            .map(|e| Atom { name: e.clone(), element: e.clone() })
            .collect::<Vec<_>>();
        let objects = (0 .. atoms.len()).map(ChemicalObject::Atom).collect();
        let molecule_of = vec![None; atoms.len()];
        Self { atoms, objects, molecule_of }
    }


    pub fn natoms(&self) -> usize { self.atoms.len() }
    pub fn atoms(&self) -> &[Atom] { &self.atoms }
    pub fn objects(&self) -> &[ChemicalObject] { &self.objects }


    pub fn all_atoms(&self) -> BTreeSet<usize> {
        (0 .. self.atoms.len()).collect()
    }


    /// Split a selection into groups of atoms. Atoms outside any molecule form their own
    /// group at the molecule level. Groups are ordered by their first atom.
    pub fn group(&self, selection: &BTreeSet<usize>, level: GroupingLevel) -> Vec<Vec<usize>> {
        match level {
            GroupingLevel::Atom => selection.iter().map(|&i| vec![i]).collect(),
            GroupingLevel::Molecule => {
                let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
                let mut first_of: BTreeMap<usize, usize> = BTreeMap::new();
                for &i in selection.iter() {
                    let key = match self.molecule_of[i] {
                        Some(imol) => *first_of.entry(imol).or_insert(i),
                        None => i,
                    };
                    groups.entry(key).or_default().push(i);
                }
                groups.into_values().collect()
            },
        }
    }
}


#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Two waters and a free argon atom.
    pub(crate) fn water_universe() -> Universe {
        let atoms = ["OW", "HW1", "HW2", "OW", "HW1", "HW2", "Ar"].iter()
            .map(|n| Atom {
                name: n.to_string(),
                element: n.trim_end_matches(char::is_numeric).trim_end_matches('W').to_string(),
            })
            .collect();
        let objects = vec![
            ChemicalObject::Molecule { name: "Water".into(), atoms: vec![0, 1, 2] },
            ChemicalObject::Molecule { name: "Water".into(), atoms: vec![3, 4, 5] },
            ChemicalObject::Residue { name: "SOL".into(), atoms: vec![0, 1, 2, 3, 4, 5] },
        ];
        Universe::new(atoms, objects).unwrap()
    }

    #[test]
    fn test_universe() {
        let u = water_universe();
        assert_eq!(u.natoms(), 7);
        assert_eq!(u.atoms()[1].element, "H");
        assert_eq!(u.atoms()[6].element, "Ar");
        assert_eq!(u.objects().len(), 4);
        assert_eq!(u.objects()[3], ChemicalObject::Atom(6));
        assert_eq!(u.objects()[2].molecule_name(), None);
        assert_eq!(u.objects()[2].residue_name(), Some("SOL"));
    }

    #[test]
    fn test_grouping() {
        let u = water_universe();
        let sel: BTreeSet<usize> = [1, 2, 4, 6].into_iter().collect();
        assert_eq!(u.group(&sel, GroupingLevel::Atom), vec![vec![1], vec![2], vec![4], vec![6]]);
        assert_eq!(u.group(&sel, GroupingLevel::Molecule), vec![vec![1, 2], vec![4], vec![6]]);
    }

    #[test]
    fn test_invalid_objects() {
        let atoms = vec![Atom { name: "C".into(), element: "C".into() }];
        let objects = vec![ChemicalObject::Molecule { name: "X".into(), atoms: vec![0, 1] }];
        assert!(Universe::new(atoms.clone(), objects).is_err());

        let objects = vec![
            ChemicalObject::Molecule { name: "X".into(), atoms: vec![0] },
            ChemicalObject::Molecule { name: "Y".into(), atoms: vec![0] },
        ];
        assert!(Universe::new(atoms, objects).is_err());
    }
}
