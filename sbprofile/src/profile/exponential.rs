//! Exponential disk: `I(r) = F / (2π r0²) exp(-r / r0)`.

use std::f64::consts::PI;

use nalgebra::Vector2;
use profile_math::bisect;
use rustfft::num_complex::Complex64;

use super::{shoot_radial, SurfaceBrightness};
use crate::error::{require_finite, require_positive, ProfileError, Result};
use crate::params::GsParams;
use crate::photon::PhotonArray;
use crate::random::BaseDeviate;

/// `hlr / r0`, the root of `(1 + x) exp(-x) = 1/2`
pub const HLR_FACTOR: f64 = 1.678_346_990_016_660_5;

#[derive(Debug, Clone, PartialEq)]
pub struct Exponential {
    scale_radius: f64,
    flux: f64,
    gsparams: GsParams,
    step_k: f64,
}

/// Radius (in scale lengths) outside which a fraction `threshold` of the flux lies.
fn folding_radius(threshold: f64) -> Result<f64> {
    bisect(|x| (1.0 + x) * (-x).exp() - threshold, 1e-3, 200.0, 1e-10, 200)
        .map_err(|e| ProfileError::numerical("exponential folding radius", e))
}

impl Exponential {
    pub fn with_scale_radius(scale_radius: f64, flux: f64) -> Result<Self> {
        Self::build(require_positive("scale_radius", scale_radius)?, require_finite("flux", flux)?, GsParams::default())
    }

    pub fn with_half_light_radius(hlr: f64, flux: f64) -> Result<Self> {
        Self::with_scale_radius(require_positive("half_light_radius", hlr)? / HLR_FACTOR, flux)
    }

    fn build(scale_radius: f64, flux: f64, gsparams: GsParams) -> Result<Self> {
        let r = folding_radius(gsparams.folding_threshold)?.max(gsparams.stepk_minimum_hlr * HLR_FACTOR);
        Ok(Self {
            scale_radius,
            flux,
            step_k: PI / (r * scale_radius),
            gsparams,
        })
    }

    pub fn with_gsparams(self, gsparams: GsParams) -> Result<Self> {
        gsparams.validate()?;
        Self::build(self.scale_radius, self.flux, gsparams)
    }

    pub fn with_flux(&self, flux: f64) -> Result<Self> {
        Ok(Self {
            flux: require_finite("flux", flux)?,
            ..self.clone()
        })
    }

    pub fn scale_radius(&self) -> f64 {
        self.scale_radius
    }

    pub fn half_light_radius(&self) -> f64 {
        self.scale_radius * HLR_FACTOR
    }
}

impl SurfaceBrightness for Exponential {
    fn kind(&self) -> &'static str {
        "Exponential"
    }

    fn x_value(&self, pos: &Vector2<f64>) -> f64 {
        let r0 = self.scale_radius;
        self.flux / (2.0 * PI * r0 * r0) * (-pos.norm() / r0).exp()
    }

    fn k_value(&self, k: &Vector2<f64>) -> Complex64 {
        let kr2 = k.norm_squared() * self.scale_radius * self.scale_radius;
        Complex64::new(self.flux / ((1.0 + kr2) * (1.0 + kr2).sqrt()), 0.0)
    }

    fn flux(&self) -> f64 {
        self.flux
    }

    fn step_k(&self) -> f64 {
        self.step_k
    }

    fn max_k(&self) -> f64 {
        (self.gsparams.maxk_threshold.powf(-2.0 / 3.0) - 1.0).sqrt() / self.scale_radius
    }

    fn is_axisymmetric(&self) -> bool {
        true
    }

    fn has_hard_edges(&self) -> bool {
        false
    }

    fn max_sb(&self) -> f64 {
        self.flux.abs() / (2.0 * PI * self.scale_radius * self.scale_radius)
    }

    /// The radial density `r exp(-r)` is a Gamma(2) distribution, the sum
    /// of two unit exponential deviates.
    fn shoot(&self, n: usize, rng: &mut BaseDeviate) -> Result<PhotonArray> {
        Ok(shoot_radial(n, self.flux, self.scale_radius, rng, |rng| {
            let u1 = 1.0 - rng.uniform();
            let u2 = 1.0 - rng.uniform();
            -(u1 * u2).ln()
        }))
    }

    fn gsparams(&self) -> &GsParams {
        &self.gsparams
    }
}
