pub use anyhow::{
    self,
    Result,
    Context,
    bail,
};
pub use ndarray::{
    self,
    Array1,
    Array2,
    Array3,
};
pub use regex::Regex;
pub use log::{
    self,
    warn,
    info,
    debug,
    error,
};

pub mod numeric_methods;
pub mod trajectory;

#[allow(non_camel_case_types)]
pub type c64 = ndrustfft::Complex<f64>;

// Convenient types
pub type MatX3<T> = Vec<[T;3]>;  // Nx3 matrix
pub type Mat33<T> = [[T;3];3];   // 3x3 matrix


pub fn dot3(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}


pub fn cross3(a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}


pub fn norm3(a: &[f64; 3]) -> f64 {
    dot3(a, a).sqrt()
}


/// Determinant of a 3x3 matrix whose rows are lattice vectors, i.e. the cell volume
/// with sign.
pub fn det33(m: &Mat33<f64>) -> f64 {
    dot3(&m[0], &cross3(&m[1], &m[2]))
}


/// Index array containing negative indices => Index array full of positive indices.
/// `-1` means the last index,
/// If `v` contains `0`, selecting the total indices,  `1..=len` is returned.
pub fn index_transform(v: Vec<i32>, len: usize) -> Vec<usize> {
    if v.contains(&0) {
        (1 ..= len).collect()
    } else {
        v.into_iter()
         .map(|i| {
            if i < 0 {
                i.rem_euclid(len as i32) as usize + 1
            } else {
                i as usize
            }
         })
        .collect()
    }
}


/// Parse string containing range and integers into `Vec<i32>`
///
/// Valid strings can be `"1..5 12 -1..3 0"` will be parsed as
/// `vec![1, 2, 3, 4, 5, 12, -1, 1, 2, 3]`, `0` is filtered out.
/// If only `0` is supplied, `Ok(vec![0])` is return
pub fn range_parse(input: &str) -> Result<Vec<i32>> {
    if input.trim() == "0" {
        return Ok(vec![0]);
    }

    let mut ret = vec![];

    let re_range = Regex::new(r"^(-?\d+)\.\.(-?\d+)$")?;
    let re_digit = Regex::new(r"^-?\d+$")?;

    for s in input.split_ascii_whitespace() {
        if re_digit.is_match(s) {
            ret.push(s.parse::<i32>()?);
        } else if let Some(m) = re_range.captures(s) {
            let start = m[1].parse::<i32>()?;
            let end   = m[2].parse::<i32>()?;

            if start > end {
                bail!("[RANGE_PARSE]: start is greater than end in token \'{}\'", s);
            }

            ret.extend(start ..= end);
        } else {
            bail!("[RANGE_PARSE]: token \'{}\' is invalid, cannot be parsed as range or integer", s);
        }
    }

    let ret = ret.into_iter().filter(|x| *x != 0).collect::<Vec<_>>();

    Ok(ret)
}


/// Plain structure snapshot in Angstrom, as read from VASP-like files.
#[derive(Clone, Debug)]
pub struct Structure {
    pub cell          : Mat33<f64>,
    pub ion_types     : Vec<String>,
    pub ions_per_type : Vec<i32>,
    pub car_pos       : MatX3<f64>,
    pub frac_pos      : MatX3<f64>,
    pub constr        : Option<MatX3<bool>>,
}


impl Structure {
    pub fn nions(&self) -> usize {
        self.ions_per_type.iter().sum::<i32>() as usize
    }

    /// Element symbol for each ion, expanded from `ion_types` and `ions_per_type`.
    pub fn ion_symbols(&self) -> Vec<String> {
        self.ion_types.iter()
            .zip(self.ions_per_type.iter())
            .flat_map(|(t, &n)| std::iter::repeat(t.clone()).take(n as usize))
            .collect()
    }

    pub fn frac_to_car(frac: &[[f64; 3]], cell: &Mat33<f64>) -> MatX3<f64> {
        frac.iter()
            .map(|f| {
                let mut c = [0.0; 3];
                for i in 0 .. 3 {
                    for j in 0 .. 3 {
                        c[j] += f[i] * cell[i][j];
                    }
                }
                c
            })
            .collect()
    }
}
