//! Uniform rectangle, most often a pixel response.

use std::f64::consts::PI;

use nalgebra::Vector2;
use profile_math::sinc;
use rustfft::num_complex::Complex64;

use super::{Support, SurfaceBrightness};
use crate::error::{require_finite, require_positive, Result};
use crate::params::GsParams;
use crate::photon::PhotonArray;
use crate::random::BaseDeviate;

#[derive(Debug, Clone, PartialEq)]
pub struct BoxProfile {
    width: f64,
    height: f64,
    flux: f64,
    gsparams: GsParams,
}

impl BoxProfile {
    pub fn new(width: f64, height: f64, flux: f64) -> Result<Self> {
        Ok(Self {
            width: require_positive("width", width)?,
            height: require_positive("height", height)?,
            flux: require_finite("flux", flux)?,
            gsparams: GsParams::default(),
        })
    }

    /// Square pixel of side `scale`.
    pub fn pixel(scale: f64, flux: f64) -> Result<Self> {
        Self::new(scale, scale, flux)
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

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }
}

impl SurfaceBrightness for BoxProfile {
    fn kind(&self) -> &'static str {
        "Box"
    }

    /// Edges belong to the box.
    fn x_value(&self, pos: &Vector2<f64>) -> f64 {
        if pos.x.abs() <= 0.5 * self.width && pos.y.abs() <= 0.5 * self.height {
            self.flux / (self.width * self.height)
        } else {
            0.0
        }
    }

    fn k_value(&self, k: &Vector2<f64>) -> Complex64 {
        let v = self.flux * sinc(0.5 * k.x * self.width) * sinc(0.5 * k.y * self.height);
        Complex64::new(v, 0.0)
    }

    fn flux(&self) -> f64 {
        self.flux
    }

    fn step_k(&self) -> f64 {
        2.0 * PI / self.width.max(self.height)
    }

    /// The sinc envelope `2 / (k w)` drops below the threshold here.
    fn max_k(&self) -> f64 {
        2.0 / (self.gsparams.maxk_threshold * self.width.min(self.height))
    }

    fn is_axisymmetric(&self) -> bool {
        false
    }

    fn has_hard_edges(&self) -> bool {
        true
    }

    fn max_sb(&self) -> f64 {
        self.flux.abs() / (self.width * self.height)
    }

    fn support(&self) -> Support {
        Support::rectangle(self.width, self.height)
    }

    fn shoot(&self, n: usize, rng: &mut BaseDeviate) -> Result<PhotonArray> {
        let mut photons = PhotonArray::new(n);
        let each = if n > 0 { self.flux / n as f64 } else { 0.0 };
        for i in 0..n {
            let x = (rng.uniform() - 0.5) * self.width;
            let y = (rng.uniform() - 0.5) * self.height;
            photons.set_photon(i, x, y, each);
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
    fn test_values() {
        let b = BoxProfile::new(2.0, 0.5, 3.0).unwrap();
        assert_relative_eq!(b.x_value(&Vector2::new(1.0, 0.25)), 3.0);
        assert_eq!(b.x_value(&Vector2::new(1.01, 0.0)), 0.0);
        assert_relative_eq!(b.k_value(&Vector2::zeros()).re, 3.0);
        // first zero of the sinc along x
        assert!(b.k_value(&Vector2::new(PI, 0.0)).re.abs() < 1e-15);
        assert_relative_eq!(b.step_k(), PI);
        assert_relative_eq!(b.max_k(), 4000.0);
    }

    #[test]
    fn test_shoot_stays_inside() {
        let b = BoxProfile::pixel(0.3, 1.0).unwrap();
        let photons = b.shoot(2000, &mut BaseDeviate::new(8)).unwrap();
        assert!(photons.x().iter().chain(photons.y()).all(|v| v.abs() <= 0.15));
        assert_relative_eq!(photons.total_flux(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_support_is_rectangle() {
        let b = BoxProfile::new(1.0, 2.0, 1.0).unwrap();
        assert_eq!(b.support().x_range(), Some((-0.5, 0.5)));
        assert_eq!(b.support().y_range_at(0.0), Some((-1.0, 1.0)));
    }
}
