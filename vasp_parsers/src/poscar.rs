use std::path::Path;

use itertools::Itertools;
use shared::{
    anyhow::{anyhow, ensure},
    bail,
    det33,
    Context,
    Mat33,
    MatX3,
    Result,
    Structure,
};

use crate::read_text;


/// Header shared by POSCAR and each XDATCAR block: comment, scaling, lattice and
/// species lines.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct LatticeHeader {
    pub comment: String,
    pub scale: f64,
    pub cell: Mat33<f64>,
    pub ion_types: Vec<String>,
    pub ions_per_type: Vec<i32>,
}


impl LatticeHeader {
    /// Number of lines taken by the header.
    pub const NLINES: usize = 7;

    pub fn nions(&self) -> usize {
        self.ions_per_type.iter().sum::<i32>() as usize
    }

    pub fn parse(lines: &[&str]) -> Result<Self> {
        ensure!(lines.len() >= Self::NLINES, "Incomplete lattice header, at least {} lines required.", Self::NLINES);

        let comment = lines[0].trim().to_string();
        let scale = lines[1].trim().parse::<f64>()
            .with_context(|| format!("Invalid scaling factor: {:?}", lines[1]))?;

        let mut cell = [[0.0; 3]; 3];
        for (i, line) in lines[2 .. 5].iter().enumerate() {
            cell[i] = parse_triplet(line)
                .with_context(|| format!("Invalid lattice vector: {:?}", line))?;
        }

        // Negative scale means the target volume.
        let scale = if scale < 0.0 {
            let vol = det33(&cell).abs();
            ensure!(vol > 0.0, "Degenerated lattice vectors.");
            (-scale / vol).cbrt()
        } else {
            scale
        };
        for v in cell.iter_mut() {
            for x in v.iter_mut() {
                *x *= scale;
            }
        }

        let ion_types = lines[5].split_whitespace()
            .map(|s| s.to_string())
            .collect::<Vec<_>>();
        if ion_types.iter().any(|s| s.parse::<i32>().is_ok()) {
            bail!("Element symbols line is required, got {:?}.", lines[5]);
        }

        let ions_per_type = lines[6].split_whitespace()
            .map(|s| s.parse::<i32>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .with_context(|| format!("Invalid ion counts: {:?}", lines[6]))?;
        ensure!(ion_types.len() == ions_per_type.len(),
            "Inconsistent number of element symbols and ion counts: {} vs {}.", ion_types.len(), ions_per_type.len());
        ensure!(ions_per_type.iter().all(|&n| n > 0), "Ion counts should be positive.");

        Ok(Self {
            comment,
            scale,
            cell,
            ion_types,
            ions_per_type,
        })
    }
}


pub(crate) fn parse_triplet(line: &str) -> Result<[f64; 3]> {
    let v = line.split_whitespace()
        .take(3)
        .map(|s| s.parse::<f64>())
        .collect::<std::result::Result<Vec<_>, _>>()?;
    ensure!(v.len() == 3, "Three numbers required.");
    Ok([v[0], v[1], v[2]])
}


#[derive(Clone, Debug)]
pub struct Poscar {
    pub comment: String,
    pub cell: Mat33<f64>,
    pub ion_types: Vec<String>,
    pub ions_per_type: Vec<i32>,
    pub frac_pos: MatX3<f64>,
    pub car_pos: MatX3<f64>,
    pub constr: Option<MatX3<bool>>,
}


impl Poscar {
    pub fn from_file<P>(fname: P) -> Result<Self>
    where P: AsRef<Path> {
        let txt = read_text(&fname)?;
        Self::from_txt(&txt)
            .with_context(|| format!("Failed to parse POSCAR {:?}", fname.as_ref()))
    }


    pub fn from_txt(txt: &str) -> Result<Self> {
        let lines = txt.lines().collect::<Vec<_>>();
        let header = LatticeHeader::parse(&lines)?;
        let nions = header.nions();

        let mut iline = LatticeHeader::NLINES;
        let mut selective = false;
        let mode = lines.get(iline).ok_or_else(|| anyhow!("Missing coordinate mode line."))?;
        if mode.trim_start().starts_with(['s', 'S']) {
            selective = true;
            iline += 1;
        }

        let mode = lines.get(iline).ok_or_else(|| anyhow!("Missing coordinate mode line."))?;
        let is_cartesian = mode.trim_start().starts_with(['c', 'C', 'k', 'K']);
        iline += 1;

        ensure!(lines.len() >= iline + nions, "Expected {} ion positions, file too short.", nions);

        let mut pos = MatX3::<f64>::with_capacity(nions);
        let mut constr = MatX3::<bool>::with_capacity(nions);
        for line in &lines[iline .. iline + nions] {
            pos.push(parse_triplet(line).with_context(|| format!("Invalid position: {:?}", line))?);
            if selective {
                let flags = line.split_whitespace()
                    .skip(3)
                    .take(3)
                    .map(|s| s.starts_with(['T', 't']))
                    .collect_vec();
                ensure!(flags.len() == 3, "Selective dynamics flags missing in {:?}", line);
                constr.push([flags[0], flags[1], flags[2]]);
            }
        }

        let (frac_pos, car_pos) = if is_cartesian {
            let car_pos = pos.iter()
                .map(|p| [p[0] * header.scale, p[1] * header.scale, p[2] * header.scale])
                .collect::<MatX3<f64>>();
            (car_to_frac(&car_pos, &header.cell)?, car_pos)
        } else {
            let car_pos = Structure::frac_to_car(&pos, &header.cell);
            (pos, car_pos)
        };

        Ok(Self {
            comment: header.comment,
            cell: header.cell,
            ion_types: header.ion_types,
            ions_per_type: header.ions_per_type,
            frac_pos,
            car_pos,
            constr: if selective { Some(constr) } else { None },
        })
    }


    pub fn to_structure(&self) -> Structure {
        Structure {
            cell: self.cell,
            ion_types: self.ion_types.clone(),
            ions_per_type: self.ions_per_type.clone(),
            car_pos: self.car_pos.clone(),
            frac_pos: self.frac_pos.clone(),
            constr: self.constr.clone(),
        }
    }
}


impl From<Poscar> for Structure {
    fn from(p: Poscar) -> Self {
        Self {
            cell: p.cell,
            ion_types: p.ion_types,
            ions_per_type: p.ions_per_type,
            car_pos: p.car_pos,
            frac_pos: p.frac_pos,
            constr: p.constr,
        }
    }
}


fn car_to_frac(car: &[[f64; 3]], cell: &Mat33<f64>) -> Result<MatX3<f64>> {
    let det = det33(cell);
    ensure!(det.abs() > 1E-12, "Singular lattice matrix.");

    // inv = adj(cell) / det
    let c = cell;
    let inv = [
        [ (c[1][1]*c[2][2] - c[1][2]*c[2][1]) / det,
         -(c[0][1]*c[2][2] - c[0][2]*c[2][1]) / det,
          (c[0][1]*c[1][2] - c[0][2]*c[1][1]) / det],
        [-(c[1][0]*c[2][2] - c[1][2]*c[2][0]) / det,
          (c[0][0]*c[2][2] - c[0][2]*c[2][0]) / det,
         -(c[0][0]*c[1][2] - c[0][2]*c[1][0]) / det],
        [ (c[1][0]*c[2][1] - c[1][1]*c[2][0]) / det,
         -(c[0][0]*c[2][1] - c[0][1]*c[2][0]) / det,
          (c[0][0]*c[1][1] - c[0][1]*c[1][0]) / det],
    ];

    Ok(Structure::frac_to_car(car, &inv))
}


#[cfg(test)]
mod tests {
    use super::*;

    const POSCAR: &str = "\
H2O molecule
1.0
  10.0  0.0  0.0
   0.0 10.0  0.0
   0.0  0.0 10.0
O H
1 2
Selective dynamics
Direct
 0.5  0.5  0.5  T T T
 0.6  0.5  0.5  F F T
 0.4  0.5  0.5  T F F
";

    #[test]
    fn test_parse_poscar() {
        let pos = Poscar::from_txt(POSCAR).unwrap();
        assert_eq!(pos.ion_types, vec!["O", "H"]);
        assert_eq!(pos.ions_per_type, vec![1, 2]);
        assert_eq!(pos.cell[1][1], 10.0);
        assert!((pos.car_pos[1][0] - 6.0).abs() < 1E-12);
        assert_eq!(pos.constr.as_ref().unwrap()[1], [false, false, true]);

        let s: Structure = pos.into();
        assert_eq!(s.nions(), 3);
        assert_eq!(s.ion_symbols(), vec!["O", "H", "H"]);
    }

    #[test]
    fn test_cartesian_poscar() {
        let txt = "cart\n2.0\n 2 0 0\n 0 2 0\n 0 0 2\nC\n1\nCartesian\n 1.0 2.0 3.0\n";
        let pos = Poscar::from_txt(txt).unwrap();
        assert_eq!(pos.cell[0][0], 4.0);
        assert_eq!(pos.car_pos[0], [2.0, 4.0, 6.0]);
        assert!((pos.frac_pos[0][2] - 1.5).abs() < 1E-12);
    }

    #[test]
    fn test_missing_symbols() {
        let txt = "old\n1.0\n 2 0 0\n 0 2 0\n 0 0 2\n1\nDirect\n 0 0 0\n";
        assert!(Poscar::from_txt(txt).is_err());
    }
}
