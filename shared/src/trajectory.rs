use super::Structure;

/// Series of structure snapshots, all in Angstrom.
#[derive(Clone, Debug)]
pub struct Trajectory {
    pub dat: Vec<Structure>,
}


impl From<Vec<Structure>> for Trajectory {
    fn from(dat: Vec<Structure>) -> Self {
        Self { dat }
    }
}


impl Trajectory {
    pub fn len(&self) -> usize {
        self.dat.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dat.is_empty()
    }

    pub fn nions(&self) -> usize {
        self.dat.first().map(|s| s.nions()).unwrap_or(0)
    }
}
