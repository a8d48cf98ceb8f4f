use std::fmt;

use shared::{
    ndarray::{Array2, Axis},
    norm3,
};


/// Projection applied on coordinate series before the analysis.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum Projector {
    #[default]
    Null,
    /// Keep the component along the unit vector.
    Axial([f64; 3]),
    /// Remove the component along the unit normal.
    Planar([f64; 3]),
}


impl Projector {
    /// `None` for a null direction.
    pub fn axial(direction: [f64; 3]) -> Option<Self> {
        normalized(direction).map(Self::Axial)
    }

    pub fn planar(normal: [f64; 3]) -> Option<Self> {
        normalized(normal).map(Self::Planar)
    }


    /// Project every row of `series` (`[nframes, 3]`) in place.
    pub fn apply(&self, series: &mut Array2<f64>) {
        match self {
            Self::Null => (),
            Self::Axial(u) => {
                for mut r in series.axis_iter_mut(Axis(0)) {
                    let d = r[0] * u[0] + r[1] * u[1] + r[2] * u[2];
                    for k in 0 .. 3 {
                        r[k] = d * u[k];
                    }
                }
            },
            Self::Planar(n) => {
                for mut r in series.axis_iter_mut(Axis(0)) {
                    let d = r[0] * n[0] + r[1] * n[1] + r[2] * n[2];
                    for k in 0 .. 3 {
                        r[k] -= d * n[k];
                    }
                }
            },
        }
    }
}


fn normalized(v: [f64; 3]) -> Option<[f64; 3]> {
    let n = norm3(&v);
    if n < 1E-12 || !n.is_finite() {
        None
    } else {
        Some([v[0] / n, v[1] / n, v[2] / n])
    }
}


impl fmt::Display for Projector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "no projection"),
            Self::Axial(u) => write!(f, "axial projection along {:?}", u),
            Self::Planar(n) => write!(f, "planar projection with normal {:?}", n),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use shared::ndarray::array;

    #[test]
    fn test_projections() {
        let series = array![[1.0, 2.0, 3.0], [-1.0, 0.5, 4.0]];

        let mut s = series.clone();
        Projector::Null.apply(&mut s);
        assert_eq!(s, series);

        let mut s = series.clone();
        Projector::axial([0.0, 0.0, 2.0]).unwrap().apply(&mut s);
        assert_eq!(s, array![[0.0, 0.0, 3.0], [0.0, 0.0, 4.0]]);

        let mut s = series.clone();
        Projector::planar([0.0, 0.0, 5.0]).unwrap().apply(&mut s);
        assert_eq!(s, array![[1.0, 2.0, 0.0], [-1.0, 0.5, 0.0]]);

        assert!(Projector::axial([0.0; 3]).is_none());
    }
}
