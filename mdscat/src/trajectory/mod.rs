use std::fmt;
use std::path::Path;
use std::str::FromStr;

use hdf5::{
    File as H5File,
    types::VarLenUnicode,
};
use shared::{
    info,
    ndarray::{self as nd, s, Array1, Array2, Array3},
    trajectory::Trajectory as VaspTrajectory,
    Mat33,
};
use vasp_parsers::Xdatcar;

use crate::error::{Error, Result};

pub mod elements;
pub mod projection;
pub mod universe;

pub use projection::Projector;
pub use universe::{
    Atom,
    ChemicalObject,
    GroupingLevel,
    ObjectKind,
    Universe,
};


/// Angstrom to nm.
pub const ANGSTROM: f64 = 0.1;


#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrajectoryFormat {
    /// Native layout, see [`Trajectory::save_to_h5`].
    Hdf5,
    Xdatcar,
}


impl TrajectoryFormat {
    /// Guess the format from the file name: `.h5`/`.hdf5` are native, everything else is
    /// read as XDATCAR.
    pub fn detect(path: &Path) -> Self {
        let ext = path.extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "h5" | "hdf5" => Self::Hdf5,
            _ => Self::Xdatcar,
        }
    }
}


impl FromStr for TrajectoryFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, String> {
        match s.to_ascii_lowercase().as_str() {
            "hdf5" | "h5" => Ok(Self::Hdf5),
            "xdatcar" | "vasp" => Ok(Self::Xdatcar),
            _ => Err(format!("unknown trajectory format '{}', expected 'hdf5' or 'xdatcar'", s)),
        }
    }
}


/// Read-only MD trajectory: coordinates in nm, time in ps.
#[derive(Clone, Debug, PartialEq)]
pub struct Trajectory {
    universe: Universe,
    coordinates: Array3<f64>,       // iframe, iatom, ixyz
    cells: Option<Array3<f64>>,     // iframe, ivec, ixyz
    time: Array1<f64>,
}


impl Trajectory {
    pub fn new(universe: Universe,
               coordinates: Array3<f64>,
               cells: Option<Array3<f64>>,
               time: Array1<f64>) -> Result<Self> {
        let (nframes, natoms, ndim) = coordinates.dim();
        if nframes == 0 {
            return Err(Error::trajectory("trajectory without frame"));
        }
        if ndim != 3 || natoms != universe.natoms() {
            return Err(Error::trajectory(format!(
                "coordinates of shape {:?} do not match {} atoms", coordinates.shape(), universe.natoms())));
        }
        if time.len() != nframes {
            return Err(Error::trajectory(format!("{} time values for {} frames", time.len(), nframes)));
        }
        if time.windows(2).into_iter().any(|w| w[1] <= w[0]) {
            return Err(Error::trajectory("time should be strictly increasing"));
        }
        if let Some(c) = cells.as_ref() {
            if c.dim() != (nframes, 3, 3) {
                return Err(Error::trajectory(format!("cells of shape {:?} do not match {} frames", c.shape(), nframes)));
            }
        }

        Ok(Self { universe, coordinates, cells, time })
    }


    pub fn get_universe(&self) -> &Universe { &self.universe }
    pub fn get_coordinates(&self) -> &Array3<f64> { &self.coordinates }
    pub fn get_time(&self) -> &Array1<f64> { &self.time }
    pub fn nframes(&self) -> usize { self.coordinates.dim().0 }
    pub fn natoms(&self) -> usize { self.coordinates.dim().1 }

    /// MD time step, `0.0` for a single frame.
    pub fn time_step(&self) -> f64 {
        if self.time.len() > 1 { self.time[1] - self.time[0] } else { 0.0 }
    }

    /// Lattice vectors (rows, nm) of frame `iframe`, `None` for non-periodic systems.
    pub fn cell(&self, iframe: usize) -> Option<Mat33<f64>> {
        let c = self.cells.as_ref()?;
        let mut ret = [[0.0; 3]; 3];
        for i in 0 .. 3 {
            for j in 0 .. 3 {
                ret[i][j] = c[[iframe, i, j]];
            }
        }
        Some(ret)
    }


    /// Mean position of the atoms `indexes` at each frame of `frames`, shape
    /// `[frames.len(), 3]`.
    pub fn read_atoms_trajectory(&self, indexes: &[usize], frames: &[usize]) -> Array2<f64> {
        let mut ret = Array2::<f64>::zeros((frames.len(), 3));
        if indexes.is_empty() {
            return ret;
        }
        let norm = 1.0 / indexes.len() as f64;
        for (irow, &iframe) in frames.iter().enumerate() {
            for &iatom in indexes {
                let r = self.coordinates.slice(s![iframe, iatom, ..]);
                for k in 0 .. 3 {
                    ret[[irow, k]] += r[k] * norm;
                }
            }
        }
        ret
    }


    pub fn from_file(path: &Path, format: TrajectoryFormat, time_step: f64) -> Result<Self> {
        info!("Loading trajectory from {:?} as {:?} ...", path, format);
        match format {
            TrajectoryFormat::Hdf5 => Self::from_h5(path),
            TrajectoryFormat::Xdatcar => {
                let x = Xdatcar::from_file(path).map_err(|e| Error::trajectory(format!("{:#}", e)))?;
                Self::from_vasp(&VaspTrajectory::from(x), time_step)
            },
        }
    }


    /// Build from VASP frames (Angstrom). Fractional coordinates are unwrapped across
    /// periodic boundaries so that atoms move continuously.
    pub fn from_vasp(traj: &VaspTrajectory, time_step: f64) -> Result<Self> {
        if traj.is_empty() {
            return Err(Error::trajectory("trajectory without frame"));
        }
        if !(time_step > 0.0) {
            return Err(Error::trajectory(format!("invalid time step {}", time_step)));
        }

        let nframes = traj.len();
        let natoms = traj.nions();
        let universe = Universe::from_elements(&traj.dat[0].ion_symbols());

        let mut coordinates = Array3::<f64>::zeros((nframes, natoms, 3));
        let mut cells = Array3::<f64>::zeros((nframes, 3, 3));
        let mut frac_prev: Option<Vec<[f64; 3]>> = None;

        for (iframe, s) in traj.dat.iter().enumerate() {
            if s.frac_pos.len() != natoms {
                return Err(Error::trajectory(format!("frame {} has {} atoms instead of {}", iframe, s.frac_pos.len(), natoms)));
            }

            let frac = match frac_prev.as_ref() {
                None => s.frac_pos.clone(),
                Some(prev) => prev.iter().zip(s.frac_pos.iter())
                    .map(|(p, f)| {
                        let mut u = [0.0; 3];
                        for k in 0 .. 3 {
                            let d = f[k] - p[k];
                            u[k] = p[k] + d - d.round();
                        }
                        u
                    })
                    .collect(),
            };

            let car = shared::Structure::frac_to_car(&frac, &s.cell);
            for (iatom, r) in car.iter().enumerate() {
                for k in 0 .. 3 {
                    coordinates[[iframe, iatom, k]] = r[k] * ANGSTROM;
                }
            }
            for i in 0 .. 3 {
                for j in 0 .. 3 {
                    cells[[iframe, i, j]] = s.cell[i][j] * ANGSTROM;
                }
            }
            frac_prev = Some(frac);
        }

        let time = Array1::from_iter((0 .. nframes).map(|i| i as f64 * time_step));
        Self::new(universe, coordinates, Some(cells), time)
    }


    pub fn from_h5<P>(fname: P) -> Result<Self>
    where P: AsRef<Path> {
        let f = H5File::open(fname)?;

        let coordinates: Array3<f64> = f.dataset("coordinates")?.read()?;
        let time: Array1<f64> = f.dataset("time")?.read()?;
        let cells: Option<Array3<f64>> = match f.dataset("cell") {
            Ok(d) => Some(d.read()?),
            Err(_) => None,
        };

        let atom_names = read_strings(&f, "atom_names")?;
        let atom_elements = read_strings(&f, "atom_elements")?;
        if atom_names.len() != atom_elements.len() {
            return Err(Error::trajectory("atom_names and atom_elements differ in length"));
        }
        let atoms = atom_names.into_iter().zip(atom_elements)
            .map(|(name, element)| Atom { name, element })
            .collect::<Vec<_>>();

        let object_kinds = read_strings(&f, "object_kinds")?;
        let object_names = read_strings(&f, "object_names")?;
        let offsets: Array1<u64> = f.dataset("object_offsets")?.read()?;
        let members: Array1<u64> = f.dataset("object_atoms")?.read()?;
        if object_names.len() != object_kinds.len() || offsets.len() != object_kinds.len() + 1 {
            return Err(Error::trajectory("inconsistent chemical object tables"));
        }

        let mut objects = Vec::with_capacity(object_kinds.len());
        for (i, (kind, name)) in object_kinds.iter().zip(object_names).enumerate() {
            let (beg, end) = (offsets[i] as usize, offsets[i + 1] as usize);
            if beg > end || end > members.len() {
                return Err(Error::trajectory(format!("invalid offsets of chemical object #{}", i)));
            }
            let atoms = members.slice(s![beg .. end]).iter().map(|&a| a as usize).collect::<Vec<_>>();
            let obj = match kind.parse::<ObjectKind>()? {
                ObjectKind::Atom if atoms.len() == 1 => ChemicalObject::Atom(atoms[0]),
                ObjectKind::Atom => return Err(Error::trajectory(format!("atom object #{} with {} atoms", i, atoms.len()))),
                ObjectKind::Molecule => ChemicalObject::Molecule { name, atoms },
                ObjectKind::Residue => ChemicalObject::Residue { name, atoms },
            };
            objects.push(obj);
        }

        let universe = Universe::new(atoms, objects)?;
        Self::new(universe, coordinates, cells, time)
    }


    pub fn save_to_h5<P>(&self, fname: P) -> Result<()>
    where P: AsRef<Path> {
        let f = H5File::create(fname)?;

        f.new_dataset_builder().with_data(&self.coordinates).create("coordinates")?;
        f.new_dataset_builder().with_data(&self.time).create("time")?;
        if let Some(cells) = self.cells.as_ref() {
            f.new_dataset_builder().with_data(cells).create("cell")?;
        }

        let atoms = self.universe.atoms();
        write_strings(&f, "atom_names", atoms.iter().map(|a| a.name.as_str()))?;
        write_strings(&f, "atom_elements", atoms.iter().map(|a| a.element.as_str()))?;

        let objects = self.universe.objects();
        write_strings(&f, "object_kinds", objects.iter().map(|o| o.kind().as_str()))?;
        write_strings(&f, "object_names", objects.iter().map(|o| o.name(&self.universe)))?;

        let mut offsets = vec![0u64];
        let mut members = vec![];
        for o in objects {
            members.extend(o.atoms().iter().map(|&a| a as u64));
            offsets.push(members.len() as u64);
        }
        f.new_dataset_builder().with_data(&Array1::from(offsets)).create("object_offsets")?;
        f.new_dataset_builder().with_data(&Array1::from(members)).create("object_atoms")?;

        Ok(())
    }
}


impl fmt::Display for Trajectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} frames of {} atoms, time step {} ps, {}",
            self.nframes(), self.natoms(), self.time_step(),
            if self.cells.is_some() { "periodic" } else { "non periodic" })
    }
}


fn read_strings(f: &H5File, name: &str) -> Result<Vec<String>> {
    let raw: nd::Array1<VarLenUnicode> = f.dataset(name)?.read()?;
    Ok(raw.iter().map(|s| s.as_str().to_string()).collect())
}


pub(crate) fn to_varlen(s: &str) -> Result<VarLenUnicode> {
    s.parse::<VarLenUnicode>()
        .map_err(|e| Error::trajectory(format!("cannot store string {:?}: {}", s, e)))
}


fn write_strings<'a, I>(f: &H5File, name: &str, items: I) -> Result<()>
where I: Iterator<Item = &'a str> {
    let data = items.map(to_varlen).collect::<Result<Vec<_>>>()?;
    f.new_dataset_builder().with_data(&Array1::from(data)).create(name)?;
    Ok(())
}
