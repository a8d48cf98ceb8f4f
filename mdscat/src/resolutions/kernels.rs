use std::f64::consts::PI;

use shared::ndarray::{Array1, ArrayView1};

use crate::configurators::FloatConfigurator;
use crate::core::{
    ConfiguratorCatalog,
    ConfiguratorSpec,
    Configuration,
};
use crate::error::Result;
use super::{
    InstrumentResolution,
    ResolutionKernel,
};


fn mu_sigma_catalog() -> ConfiguratorCatalog {
    ConfiguratorCatalog::new()
        .with(ConfiguratorSpec::new("mu", "float").with_option("default", 0.0))
        .with(ConfiguratorSpec::new("sigma", "float")
            .with_option("default", 1.0)
            .with_option("mini", 1E-12))
}


fn mu_sigma(cfg: &Configuration) -> Result<(f64, f64)> {
    let mu = cfg.get::<FloatConfigurator>("mu")?.get_value();
    let sigma = cfg.get::<FloatConfigurator>("sigma")?.get_value();
    Ok((mu, sigma))
}


/// Perfect instrument: no broadening.
pub struct IdealResolution;


impl InstrumentResolution for IdealResolution {
    fn set_kernel(&self, frequencies: ArrayView1<f64>, _dt: f64) -> ResolutionKernel {
        let n = frequencies.len();
        let mut frequency_window = Array1::<f64>::zeros(n);
        if n > 0 {
            frequency_window[n / 2] = 1.0;
        }
        ResolutionKernel {
            frequency_window,
            time_window: Array1::ones(n),
        }
    }
}


/// `exp(-(w - mu)^2 / 2 sigma^2) / (sigma sqrt(2 pi))`
pub struct GaussianResolution {
    pub mu: f64,
    pub sigma: f64,
}


impl GaussianResolution {
    pub fn catalog() -> ConfiguratorCatalog {
        mu_sigma_catalog()
    }

    pub fn from_configuration(cfg: &Configuration) -> Result<Self> {
        let (mu, sigma) = mu_sigma(cfg)?;
        Ok(Self { mu, sigma })
    }
}


impl InstrumentResolution for GaussianResolution {
    fn set_kernel(&self, frequencies: ArrayView1<f64>, dt: f64) -> ResolutionKernel {
        let norm = 1.0 / (self.sigma * (2.0 * PI).sqrt());
        let fw = frequencies.mapv(|f| {
            let x = (f - self.mu) / self.sigma;
            norm * (-0.5 * x * x).exp()
        });
        ResolutionKernel::from_frequency_window(fw, dt)
    }
}


/// `(1/pi) (sigma/2) / ((w - mu)^2 + (sigma/2)^2)`, `sigma` being the full width at
/// half maximum.
pub struct LorentzianResolution {
    pub mu: f64,
    pub sigma: f64,
}


impl LorentzianResolution {
    pub fn catalog() -> ConfiguratorCatalog {
        mu_sigma_catalog()
    }

    pub fn from_configuration(cfg: &Configuration) -> Result<Self> {
        let (mu, sigma) = mu_sigma(cfg)?;
        Ok(Self { mu, sigma })
    }
}


impl InstrumentResolution for LorentzianResolution {
    fn set_kernel(&self, frequencies: ArrayView1<f64>, dt: f64) -> ResolutionKernel {
        let fact = 0.5 * self.sigma;
        let fw = frequencies.mapv(|f| {
            let x = f - self.mu;
            fact / (x * x + fact * fact) / PI
        });
        ResolutionKernel::from_frequency_window(fw, dt)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use shared::numeric_methods::{fft_freq_1d, fftshift};

    fn grid(nframes: usize, dt: f64) -> Array1<f64> {
        let f: Array1<f64> = fft_freq_1d(2 * nframes - 1, dt);
        fftshift(f.mapv(|x| 2.0 * PI * x).view())
    }

    fn check_kernel(k: &ResolutionKernel, df: f64) {
        let n = k.frequency_window.len();
        let c = n / 2;
        assert_eq!(k.time_window.len(), n);

        let integral = k.frequency_window.sum() * df;
        assert!((integral - 1.0).abs() < 2E-2, "integral = {}", integral);

        let peak = k.time_window.iter().cloned().fold(f64::MIN, f64::max);
        assert!((k.time_window[c] - peak).abs() < 1E-12);
        for i in 1 .. c {
            assert!((k.time_window[c - i] - k.time_window[c + i]).abs() < 1E-9);
            assert!((k.frequency_window[c - i] - k.frequency_window[c + i]).abs() < 1E-12);
        }
    }

    #[test]
    fn test_gaussian_and_lorentzian() {
        let dt = 0.01;
        let f = grid(500, dt);
        let df = f[1] - f[0];

        let g = GaussianResolution { mu: 0.0, sigma: 5.0 }.set_kernel(f.view(), dt);
        check_kernel(&g, df);

        let l = LorentzianResolution { mu: 0.0, sigma: 5.0 }.set_kernel(f.view(), dt);
        check_kernel(&l, df);
    }

    #[test]
    fn test_ideal() {
        let f = grid(4, 0.5);
        let k = IdealResolution.set_kernel(f.view(), 0.5);
        assert_eq!(k.frequency_window.to_vec(), vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0]);
        assert!(k.time_window.iter().all(|&v| v == 1.0));
    }
}
