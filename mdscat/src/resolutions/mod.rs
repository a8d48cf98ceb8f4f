//! Instrument resolution kernels. A kernel turns the angular frequency grid of an
//! analysis into a frequency window and the matching time window used to broaden
//! correlation functions before their Fourier transform.

use shared::{
    c64,
    ndarray::{Array1, ArrayView1},
    numeric_methods::{fftshift, ifft_1d},
};

use crate::core::{
    ConfiguratorCatalog,
    Configuration,
    Registry,
};
use crate::error::Result;

mod kernels;

pub use kernels::{
    GaussianResolution,
    IdealResolution,
    LorentzianResolution,
};


#[derive(Clone, Debug, PartialEq)]
pub struct ResolutionKernel {
    pub frequency_window: Array1<f64>,
    pub time_window: Array1<f64>,
}


impl ResolutionKernel {
    /// Time window `fftshift(|ifft(frequency_window)|) / dt` of a centred frequency
    /// window.
    pub fn from_frequency_window(frequency_window: Array1<f64>, dt: f64) -> Self {
        let fw = frequency_window.mapv(|v| c64::new(v, 0.0));
        let tw = ifft_1d(fw.view()).mapv(|v| v.norm() / dt);
        let time_window = fftshift(tw.view());
        Self { frequency_window, time_window }
    }
}


pub trait InstrumentResolution: Send + Sync {
    /// `frequencies` is the centred angular frequency grid (rad/ps), `dt` the time step
    /// of the analysed signal (ps).
    fn set_kernel(&self, frequencies: ArrayView1<f64>, dt: f64) -> ResolutionKernel;
}


/// A resolution kind: the catalog of its parameters and its constructor from the
/// resolved parameters.
#[derive(Clone, Copy)]
pub struct ResolutionPlugin {
    pub catalog: fn() -> ConfiguratorCatalog,
    pub build: fn(&Configuration) -> Result<Box<dyn InstrumentResolution>>,
}


pub fn register_all(registry: &mut Registry<ResolutionPlugin>) {
    registry.register("ideal", ResolutionPlugin {
        catalog: ConfiguratorCatalog::new,
        build: |_| Ok(Box::new(IdealResolution)),
    });
    registry.register("gaussian", ResolutionPlugin {
        catalog: GaussianResolution::catalog,
        build: |cfg| Ok(Box::new(GaussianResolution::from_configuration(cfg)?)),
    });
    registry.register("lorentzian", ResolutionPlugin {
        catalog: LorentzianResolution::catalog,
        build: |cfg| Ok(Box::new(LorentzianResolution::from_configuration(cfg)?)),
    });
}
