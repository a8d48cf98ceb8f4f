//! Reciprocal space sampling: generators of q vectors bucketed in shells of
//! (approximately) equal norm.

use std::collections::BTreeMap;
use std::f64::consts::PI;

use ordered_float::OrderedFloat;
use shared::{
    cross3,
    det33,
    ndarray::Array2,
    Mat33,
};

use crate::core::{
    ConfiguratorCatalog,
    Configuration,
    Outcome,
    Registry,
    Status,
};
use crate::error::Result;

pub(crate) mod spherical_lattice;

pub use spherical_lattice::SphericalLatticeQVectors;


/// Vectors of one shell, stored as columns.
#[derive(Clone, Debug, PartialEq)]
pub struct QShell {
    pub q: f64,
    /// `[3, n_q_vectors]`, inverse nm.
    pub q_vectors: Array2<f64>,
    /// `[3, n_q_vectors]`, lattice triples producing `q_vectors`.
    pub hkls: Array2<i64>,
    pub n_q_vectors: usize,
}


/// Shell radius -> shell, only non-empty shells are present.
pub type QVectorsDefinition = BTreeMap<OrderedFloat<f64>, QShell>;


pub trait QVectorsGenerator: Send + Sync {
    /// Polls `status` after each shell and gives up once a stop is requested.
    fn generate(&self, status: &Status) -> Outcome<QVectorsDefinition>;
}


/// A generator kind: the catalog of its parameters and its constructor from the resolved
/// parameters and the unit cell (rows are lattice vectors, nm).
#[derive(Clone, Copy)]
pub struct QVectorsPlugin {
    pub catalog: fn() -> ConfiguratorCatalog,
    pub build: fn(&Configuration, &Mat33<f64>) -> Result<Box<dyn QVectorsGenerator>>,
}


pub fn register_all(registry: &mut Registry<QVectorsPlugin>) {
    registry.register("spherical_lattice", QVectorsPlugin {
        catalog: SphericalLatticeQVectors::catalog,
        build: |cfg, cell| Ok(Box::new(SphericalLatticeQVectors::from_configuration(cfg, cell)?)),
    });
}


/// Reciprocal basis `b_i = 2 pi (a_j x a_k) / V`, `None` for a degenerate cell.
pub fn reciprocal_basis(cell: &Mat33<f64>) -> Option<Mat33<f64>> {
    let volume = det33(cell);
    if volume.abs() < 1E-12 || !volume.is_finite() {
        return None;
    }
    let f = 2.0 * PI / volume;
    let b0 = cross3(&cell[1], &cell[2]);
    let b1 = cross3(&cell[2], &cell[0]);
    let b2 = cross3(&cell[0], &cell[1]);
    Some([b0, b1, b2].map(|b| b.map(|x| x * f)))
}


#[cfg(test)]
mod tests {
    use super::*;
    use shared::dot3;

    #[test]
    fn test_reciprocal_basis() {
        let cell = [[1.0, 0.0, 0.0], [0.5, 2.0, 0.0], [0.1, 0.2, 3.0]];
        let b = reciprocal_basis(&cell).unwrap();
        for i in 0 .. 3 {
            for j in 0 .. 3 {
                let expected = if i == j { 2.0 * PI } else { 0.0 };
                assert!((dot3(&cell[i], &b[j]) - expected).abs() < 1E-12);
            }
        }
        assert!(reciprocal_basis(&[[1.0, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 0.0, 1.0]]).is_none());
    }
}
