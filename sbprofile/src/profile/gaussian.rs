//! Circular Gaussian: `I(r) = F / (2πσ²) exp(-r² / 2σ²)`.

use std::f64::consts::PI;

use nalgebra::Vector2;
use rand_distr::{Distribution, StandardNormal};
use rustfft::num_complex::Complex64;

use super::SurfaceBrightness;
use crate::error::{require_finite, require_positive, Result};
use crate::params::GsParams;
use crate::photon::PhotonArray;
use crate::random::BaseDeviate;

/// `fwhm / sigma = 2 sqrt(2 ln 2)`
pub const FWHM_FACTOR: f64 = 2.354_820_045_030_949_3;
/// `hlr / sigma = sqrt(2 ln 2)`
pub const HLR_FACTOR: f64 = 1.177_410_022_515_474_7;

#[derive(Debug, Clone, PartialEq)]
pub struct Gaussian {
    sigma: f64,
    flux: f64,
    gsparams: GsParams,
}

impl Gaussian {
    pub fn with_sigma(sigma: f64, flux: f64) -> Result<Self> {
        Ok(Self {
            sigma: require_positive("sigma", sigma)?,
            flux: require_finite("flux", flux)?,
            gsparams: GsParams::default(),
        })
    }

    pub fn with_fwhm(fwhm: f64, flux: f64) -> Result<Self> {
        Self::with_sigma(require_positive("fwhm", fwhm)? / FWHM_FACTOR, flux)
    }

    pub fn with_half_light_radius(hlr: f64, flux: f64) -> Result<Self> {
        Self::with_sigma(require_positive("half_light_radius", hlr)? / HLR_FACTOR, flux)
    }

    pub fn with_gsparams(mut self, gsparams: GsParams) -> Result<Self> {
        gsparams.validate()?;
        self.gsparams = gsparams;
        Ok(self)
    }

    pub fn with_flux(&self, flux: f64) -> Result<Self> {
        Ok(Self {
            flux: require_finite("flux", flux)?,
            ..self.clone()
        })
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    pub fn fwhm(&self) -> f64 {
        self.sigma * FWHM_FACTOR
    }

    pub fn half_light_radius(&self) -> f64 {
        self.sigma * HLR_FACTOR
    }
}

impl SurfaceBrightness for Gaussian {
    fn kind(&self) -> &'static str {
        "Gaussian"
    }

    fn x_value(&self, pos: &Vector2<f64>) -> f64 {
        let s2 = self.sigma * self.sigma;
        self.flux / (2.0 * PI * s2) * (-0.5 * pos.norm_squared() / s2).exp()
    }

    fn k_value(&self, k: &Vector2<f64>) -> Complex64 {
        let s2 = self.sigma * self.sigma;
        Complex64::new(self.flux * (-0.5 * k.norm_squared() * s2).exp(), 0.0)
    }

    fn flux(&self) -> f64 {
        self.flux
    }

    fn step_k(&self) -> f64 {
        // folding radius in units of sigma, never below 4 sigma
        let r = (-2.0 * self.gsparams.folding_threshold.ln()).sqrt().max(4.0);
        PI / (r * self.sigma)
    }

    fn max_k(&self) -> f64 {
        (-2.0 * self.gsparams.maxk_threshold.ln()).sqrt() / self.sigma
    }

    fn is_axisymmetric(&self) -> bool {
        true
    }

    fn has_hard_edges(&self) -> bool {
        false
    }

    fn max_sb(&self) -> f64 {
        self.flux.abs() / (2.0 * PI * self.sigma * self.sigma)
    }

    fn shoot(&self, n: usize, rng: &mut BaseDeviate) -> Result<PhotonArray> {
        let mut photons = PhotonArray::new(n);
        let each = if n > 0 { self.flux / n as f64 } else { 0.0 };
        for i in 0..n {
            let x: f64 = StandardNormal.sample(rng);
            let y: f64 = StandardNormal.sample(rng);
            photons.set_photon(i, self.sigma * x, self.sigma * y, each);
        }
        Ok(photons)
    }

    fn gsparams(&self) -> &GsParams {
        &self.gsparams
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_unit_gaussian_properties() {
        let g = Gaussian::with_sigma(1.0, 1.0).unwrap();
        assert_relative_eq!(g.max_k(), 3.716_922_188_849_838_3, epsilon = 1e-12);
        assert_relative_eq!(g.step_k(), 0.785_398_163_397_448_3, epsilon = 1e-12);
        assert_eq!(g.k_value(&Vector2::zeros()), Complex64::new(1.0, 0.0));
        assert_relative_eq!(g.x_value(&Vector2::zeros()), 0.159_154_943_091_895_35, epsilon = 1e-15);
        assert_eq!(g.centroid(), Vector2::zeros());
    }

    #[test]
    fn test_radius_conversions() {
        let g = Gaussian::with_half_light_radius(1.8, 1.0).unwrap();
        assert_relative_eq!(g.half_light_radius(), 1.8, epsilon = 1e-14);
        let center = g.x_value(&Vector2::zeros());
        let at_half_max = g.x_value(&Vector2::new(0.5 * g.fwhm(), 0.0));
        assert_relative_eq!(at_half_max / center, 0.5, epsilon = 1e-12);
        let at_sigma = g.x_value(&Vector2::new(g.sigma(), 0.0));
        assert_relative_eq!(at_sigma / center, (-0.5_f64).exp(), epsilon = 1e-12);
    }

    #[test]
    fn test_flux_is_carried() {
        for &flux in &[0.01, 0.5, 3.0, 100.0] {
            let g = Gaussian::with_sigma(2.0, flux).unwrap();
            assert_relative_eq!(g.k_value(&Vector2::zeros()).re, flux);
        }
    }

    #[test]
    fn test_invalid_sigma() {
        assert!(Gaussian::with_sigma(0.0, 1.0).is_err());
        assert!(Gaussian::with_fwhm(-1.0, 1.0).is_err());
        assert!(Gaussian::with_sigma(1.0, f64::NAN).is_err());
    }

    #[test]
    fn test_shoot_second_moment() {
        let g = Gaussian::with_sigma(0.7, 2.0).unwrap();
        let photons = g.shoot(20_000, &mut BaseDeviate::new(4)).unwrap();
        let n = photons.len() as f64;
        let var_x = photons.x().iter().map(|x| x * x).sum::<f64>() / n;
        assert_relative_eq!(var_x.sqrt(), 0.7, epsilon = 0.02);
        assert_relative_eq!(photons.total_flux(), 2.0, epsilon = 1e-10);
    }
}
