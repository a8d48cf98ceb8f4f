use itertools::iproduct;
use ordered_float::OrderedFloat;
use rand::{
    rngs::StdRng,
    seq::index::sample,
    SeedableRng,
};
use shared::{
    ndarray::Array2,
    norm3,
    Mat33,
};

use crate::configurators::{
    FloatConfigurator,
    IntegerConfigurator,
    RangeConfigurator,
};
use crate::core::{
    ConfiguratorCatalog,
    ConfiguratorSpec,
    Configuration,
    Outcome,
    Status,
};
use crate::error::{ConfigurationError, Result};
use super::{
    reciprocal_basis,
    QShell,
    QVectorsDefinition,
    QVectorsGenerator,
};


/// Reciprocal lattice vectors of the simulation cell, bucketed by norm into shells of
/// width `width` centred on each value of `shells`. Shells with more than `n_vectors`
/// hits are subsampled uniformly, reproducibly for a non-zero `seed`.
#[derive(Clone, Debug)]
pub struct SphericalLatticeQVectors {
    cell: Mat33<f64>,
    reciprocal: Mat33<f64>,
    seed: u64,
    shells: Vec<f64>,
    n_vectors: usize,
    width: f64,
}


impl SphericalLatticeQVectors {
    pub fn catalog() -> ConfiguratorCatalog {
        ConfiguratorCatalog::new()
            .with(ConfiguratorSpec::new("seed", "integer")
                .with_option("mini", 0)
                .with_option("default", 0))
            .with(ConfiguratorSpec::new("shells", "range")
                .with_option("value_type", "float")
                .with_option("include_last", true)
                .with_option("mini", 0.0)
                .with_option("default", toml::Value::Array(vec![0.0.into(), 10.0.into(), 1.0.into()])))
            .with(ConfiguratorSpec::new("n_vectors", "integer")
                .with_option("mini", 1)
                .with_option("default", 50))
            .with(ConfiguratorSpec::new("width", "float")
                .with_option("mini", 1.0E-6)
                .with_option("default", 1.0))
    }


    pub fn new(cell: &Mat33<f64>, seed: u64, shells: Vec<f64>, n_vectors: usize, width: f64) -> Result<Self> {
        let reciprocal = reciprocal_basis(cell)
            .ok_or_else(|| ConfigurationError::invalid("cell", format!("{:?}", cell), "degenerate unit cell"))?;
        Ok(Self {
            cell: *cell,
            reciprocal,
            seed,
            shells,
            n_vectors,
            width,
        })
    }


    pub fn from_configuration(cfg: &Configuration, cell: &Mat33<f64>) -> Result<Self> {
        let seed = cfg.get::<IntegerConfigurator>("seed")?.get_value();
        let shells = cfg.get::<RangeConfigurator>("shells")?.get_values().to_vec();
        let n_vectors = cfg.get::<IntegerConfigurator>("n_vectors")?.get_value();
        let width = cfg.get::<FloatConfigurator>("width")?.get_value();
        Self::new(cell, seed as u64, shells, n_vectors as usize, width)
    }


    /// Lattice index bound of each axis covering every vector of norm up to `q_max`.
    fn hkl_max(&self, q_max: f64) -> [i64; 3] {
        self.cell.map(|a| (q_max * norm3(&a) / (2.0 * std::f64::consts::PI)).ceil() as i64 + 1)
    }
}


impl QVectorsGenerator for SphericalLatticeQVectors {
    fn generate(&self, status: &Status) -> Outcome<QVectorsDefinition> {
        let mut ret = QVectorsDefinition::new();
        let Some(&last) = self.shells.last() else {
            return Outcome::Completed(ret);
        };

        let mut rng = if self.seed != 0 {
            StdRng::seed_from_u64(self.seed)
        } else {
            StdRng::from_entropy()
        };

        let half_width = 0.5 * self.width;
        let q_max = last + half_width;
        let [h, k, l] = self.hkl_max(q_max);

        let b = &self.reciprocal;
        let (hkls, vects): (Vec<[i64; 3]>, Vec<[f64; 3]>) = iproduct!(-h ..= h, -k ..= k, -l ..= l)
            .map(|(i, j, k)| {
                let (fi, fj, fk) = (i as f64, j as f64, k as f64);
                let v = [0, 1, 2].map(|x| fi * b[0][x] + fj * b[1][x] + fk * b[2][x]);
                ([i, j, k], v)
            })
            .unzip();
        let dists2 = vects.iter()
            .map(|v| v[0] * v[0] + v[1] * v[1] + v[2] * v[2])
            .collect::<Vec<_>>();

        status.start(self.shells.len());
        for &q in self.shells.iter() {
            let qmin = (q - half_width).max(0.0);
            let q2low = qmin * qmin;
            let q2up = (q + half_width) * (q + half_width);

            let mut hits = dists2.iter()
                .enumerate()
                .filter(|(_, &d)| d >= q2low && d <= q2up)
                .map(|(i, _)| i)
                .collect::<Vec<_>>();

            if hits.len() > self.n_vectors {
                let mut picked = sample(&mut rng, hits.len(), self.n_vectors).into_vec();
                picked.sort_unstable();
                hits = picked.into_iter().map(|i| hits[i]).collect();
            }

            if !hits.is_empty() {
                let n = hits.len();
                let q_vectors = Array2::from_shape_fn((3, n), |(x, i)| vects[hits[i]][x]);
                let hkls = Array2::from_shape_fn((3, n), |(x, i)| hkls[hits[i]][x]);
                ret.insert(OrderedFloat(q), QShell { q, q_vectors, hkls, n_q_vectors: n });
            }

            if status.is_stopped() {
                return Outcome::Cancelled;
            }
            status.update();
        }
        status.finish();

        Outcome::Completed(ret)
    }
}
