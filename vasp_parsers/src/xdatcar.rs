use std::path::Path;

use rayon::prelude::*;
use shared::{
    anyhow::ensure,
    bail,
    trajectory::Trajectory,
    Context,
    MatX3,
    Result,
    Structure,
};

use crate::read_text;
use crate::poscar::{LatticeHeader, parse_triplet};


/// Frames of an XDATCAR file, both fixed-cell and variable-cell (one header per
/// frame) layouts are accepted.
#[derive(Clone, Debug)]
pub struct Xdatcar {
    pub comment: String,
    pub frames: Vec<Structure>,
}


struct Block<'a> {
    header: usize,
    lines: &'a [&'a str],
}


impl Xdatcar {
    pub fn from_file<P>(fname: P) -> Result<Self>
    where P: AsRef<Path> {
        let txt = read_text(&fname)?;
        Self::from_txt(&txt)
            .with_context(|| format!("Failed to parse XDATCAR {:?}", fname.as_ref()))
    }


    pub fn from_txt(txt: &str) -> Result<Self> {
        let lines = txt.lines().collect::<Vec<_>>();

        let mut headers: Vec<LatticeHeader> = vec![];
        let mut blocks: Vec<Block> = vec![];

        let mut iline = 0;
        while iline < lines.len() {
            let line = lines[iline];
            if line.trim().is_empty() {
                iline += 1;
                continue;
            }

            if is_config_line(line) {
                let Some(header) = headers.last() else {
                    bail!("Configuration found before any lattice header at line {}.", iline + 1);
                };
                let nions = header.nions();
                let beg = iline + 1;
                ensure!(beg + nions <= lines.len(), "Truncated configuration at line {}.", iline + 1);
                blocks.push(Block { header: headers.len() - 1, lines: &lines[beg .. beg + nions] });
                iline = beg + nions;
            } else {
                let end = (iline + LatticeHeader::NLINES).min(lines.len());
                let header = LatticeHeader::parse(&lines[iline .. end])
                    .with_context(|| format!("Invalid lattice header at line {}.", iline + 1))?;
                if let Some(first) = headers.first() {
                    ensure!(first.ion_types == header.ion_types && first.ions_per_type == header.ions_per_type,
                        "Species changed at line {}, which is not supported.", iline + 1);
                }
                headers.push(header);
                iline = end;
            }
        }

        ensure!(!blocks.is_empty(), "No configuration found.");

        let frames = blocks.par_iter()
            .map(|b| -> Result<Structure> {
                let h = &headers[b.header];
                let frac_pos = b.lines.iter()
                    .map(|l| parse_triplet(l).with_context(|| format!("Invalid position: {:?}", l)))
                    .collect::<Result<MatX3<f64>>>()?;
                let car_pos = Structure::frac_to_car(&frac_pos, &h.cell);
                Ok(Structure {
                    cell: h.cell,
                    ion_types: h.ion_types.clone(),
                    ions_per_type: h.ions_per_type.clone(),
                    car_pos,
                    frac_pos,
                    constr: None,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            comment: headers[0].comment.clone(),
            frames,
        })
    }
}


fn is_config_line(line: &str) -> bool {
    let line = line.trim_start().to_ascii_lowercase();
    (line.starts_with("direct") || line.starts_with("cartesian")) && line.contains("configuration")
}


impl From<Xdatcar> for Trajectory {
    fn from(x: Xdatcar) -> Self {
        Trajectory::from(x.frames)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use flate2::{write::GzEncoder, Compression};
    use tempdir::TempDir;

    const XDATCAR: &str = "\
test
1.0
 5.0 0.0 0.0
 0.0 5.0 0.0
 0.0 0.0 5.0
Ar
2
Direct configuration=     1
 0.0 0.0 0.0
 0.5 0.5 0.5
Direct configuration=     2
 0.1 0.0 0.0
 0.5 0.6 0.5
Direct configuration=     3
 0.2 0.0 0.0
 0.5 0.7 0.5
";

    #[test]
    fn test_fixed_cell() {
        let x = Xdatcar::from_txt(XDATCAR).unwrap();
        assert_eq!(x.frames.len(), 3);
        assert_eq!(x.comment, "test");
        assert!((x.frames[2].car_pos[0][0] - 1.0).abs() < 1E-12);
        assert!((x.frames[1].car_pos[1][1] - 3.0).abs() < 1E-12);

        let traj: Trajectory = x.into();
        assert_eq!(traj.len(), 3);
        assert_eq!(traj.nions(), 2);
    }

    #[test]
    fn test_variable_cell() {
        let txt = "\
npt
1.0
 5.0 0.0 0.0
 0.0 5.0 0.0
 0.0 0.0 5.0
Ar
1
Direct configuration=     1
 0.5 0.5 0.5
npt
1.0
 6.0 0.0 0.0
 0.0 6.0 0.0
 0.0 0.0 6.0
Ar
1
Direct configuration=     2
 0.5 0.5 0.5
";
        let x = Xdatcar::from_txt(txt).unwrap();
        assert_eq!(x.frames.len(), 2);
        assert_eq!(x.frames[0].car_pos[0], [2.5, 2.5, 2.5]);
        assert_eq!(x.frames[1].car_pos[0], [3.0, 3.0, 3.0]);
    }

    #[test]
    fn test_truncated() {
        let txt = &XDATCAR[.. XDATCAR.len() - 12];
        assert!(Xdatcar::from_txt(txt).is_err());
    }

    #[test]
    fn test_gzipped() {
        let dir = TempDir::new("xdatcar").unwrap();
        let fname = dir.path().join("XDATCAR.gz");
        let mut enc = GzEncoder::new(std::fs::File::create(&fname).unwrap(), Compression::default());
        enc.write_all(XDATCAR.as_bytes()).unwrap();
        enc.finish().unwrap();

        let x = Xdatcar::from_file(&fname).unwrap();
        assert_eq!(x.frames.len(), 3);
    }
}
