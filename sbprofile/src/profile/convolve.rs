//! Convolution of profiles.
//!
//! Fourier values multiply. Real-space values come either from direct
//! quadrature (two analytic operands, at least one with hard edges) or
//! from a Fourier sum over the node's own k grid.

use std::f64::consts::PI;

use log::debug;
use nalgebra::Vector2;
use rustfft::num_complex::Complex64;

use super::realspace::convolve_at;
use super::{Profile, Support, SurfaceBrightness};
use crate::error::{ProfileError, Result};
use crate::params::GsParams;
use crate::photon::PhotonArray;
use crate::random::BaseDeviate;

#[derive(Debug, Clone)]
pub struct Convolution {
    items: Vec<Profile>,
    real_space: bool,
    flux: f64,
    step_k: f64,
    max_k: f64,
    gsparams: GsParams,
}

impl Convolution {
    /// `real_space`: `None` picks automatically, `Some(true)` forces direct
    /// quadrature (exactly two analytic operands), `Some(false)` forbids it.
    ///
    /// Nested Fourier-mode convolutions are flattened into this one.
    pub fn new(items: Vec<Profile>, real_space: Option<bool>) -> Result<Self> {
        if items.is_empty() {
            return Err(ProfileError::invalid("items", "a convolution needs at least one profile"));
        }
        let mut flat = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Profile::Convolution(inner) if !inner.real_space => flat.extend(inner.items.iter().cloned()),
                other => flat.push(other),
            }
        }

        let eligible = flat.len() == 2 && flat.iter().all(Profile::is_analytic_x);
        let real_space = match real_space {
            Some(true) if !eligible => {
                return Err(ProfileError::invalid(
                    "real_space",
                    format!(
                        "real-space convolution needs exactly two analytic profiles, got {} items",
                        flat.len()
                    ),
                ))
            }
            Some(choice) => choice,
            None => eligible && flat.iter().any(Profile::has_hard_edges),
        };
        if real_space {
            debug!("real-space convolution of {} and {}", flat[0].kind(), flat[1].kind());
        }

        let flux = flat.iter().map(Profile::flux).product();
        let step_k = flat.iter().map(Profile::step_k).fold(f64::INFINITY, f64::min);
        let max_k = flat.iter().map(Profile::max_k).fold(f64::INFINITY, f64::min);
        let gsparams = flat
            .iter()
            .skip(1)
            .fold(flat[0].gsparams().clone(), |acc, p| acc.strictest(p.gsparams()));
        Ok(Self {
            items: flat,
            real_space,
            flux,
            step_k,
            max_k,
            gsparams,
        })
    }

    pub fn items(&self) -> &[Profile] {
        &self.items
    }

    pub fn is_real_space(&self) -> bool {
        self.real_space
    }

    /// `(dk² / 4π²) Σ K(k) exp(i k·p)` over the node's Fourier grid.
    fn fourier_sum(&self, pos: &Vector2<f64>) -> f64 {
        let dk = self.step_k;
        let n = (self.max_k / dk).ceil() as i64;
        let mut total = 0.0;
        for iy in -n..=n {
            for ix in -n..=n {
                let k = Vector2::new(ix as f64 * dk, iy as f64 * dk);
                let kv = self.k_value(&k);
                total += (kv * Complex64::from_polar(1.0, k.dot(pos))).re;
            }
        }
        total * dk * dk / (4.0 * PI * PI)
    }
}

impl SurfaceBrightness for Convolution {
    fn kind(&self) -> &'static str {
        "Convolution"
    }

    fn x_value(&self, pos: &Vector2<f64>) -> f64 {
        if self.items.len() == 1 {
            return self.items[0].xval(pos);
        }
        if self.real_space {
            let rel = self.gsparams.realspace_relerr;
            let abs = self.gsparams.realspace_abserr * self.flux.abs();
            convolve_at(&self.items[0], &self.items[1], pos, rel, abs)
        } else {
            self.fourier_sum(pos)
        }
    }

    fn k_value(&self, k: &Vector2<f64>) -> Complex64 {
        self.items.iter().map(|p| p.kval(k)).product()
    }

    fn flux(&self) -> f64 {
        self.flux
    }

    fn step_k(&self) -> f64 {
        self.step_k
    }

    fn max_k(&self) -> f64 {
        self.max_k
    }

    fn centroid(&self) -> Vector2<f64> {
        self.items.iter().map(Profile::centroid).sum()
    }

    fn is_axisymmetric(&self) -> bool {
        self.items.iter().all(Profile::is_axisymmetric)
    }

    /// Convolving smooths any edge away.
    fn has_hard_edges(&self) -> bool {
        self.items.len() == 1 && self.items[0].has_hard_edges()
    }

    fn is_analytic_x(&self) -> bool {
        self.real_space || (self.items.len() == 1 && self.items[0].is_analytic_x())
    }

    fn is_analytic_k(&self) -> bool {
        self.items.iter().all(Profile::is_analytic_k)
    }

    /// `max f * g <= max(f) ∫|g|`, taking the tightest choice of `f`.
    fn max_sb(&self) -> f64 {
        let abs_flux: Vec<f64> = self.items.iter().map(|p| p.flux().abs()).collect();
        (0..self.items.len())
            .map(|i| {
                let others: f64 = abs_flux
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != i)
                    .map(|(_, f)| f)
                    .product();
                self.items[i].max_sb().abs() * others
            })
            .fold(f64::INFINITY, f64::min)
    }

    fn support(&self) -> Support {
        if self.items.len() == 1 {
            self.items[0].support()
        } else {
            Support::Unbounded
        }
    }

    /// Each factor is shot independently and the arrays are added photon
    /// by photon.
    fn shoot(&self, n: usize, rng: &mut BaseDeviate) -> Result<PhotonArray> {
        let mut photons = self.items[0].shoot(n, rng)?;
        for item in &self.items[1..] {
            let other = item.shoot(n, rng)?;
            photons.convolve(&other, rng)?;
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
    use crate::profile::{BoxProfile, Exponential, Gaussian};
    use approx::assert_relative_eq;

    fn gaussian(sigma: f64, flux: f64) -> Profile {
        Gaussian::with_sigma(sigma, flux).unwrap().into()
    }

    fn pixel() -> Profile {
        BoxProfile::pixel(0.5, 1.0).unwrap().into()
    }

    #[test]
    fn test_gaussians_add_in_quadrature() {
        let conv = Convolution::new(vec![gaussian(0.6, 2.0), gaussian(0.8, 1.5)], None).unwrap();
        assert!(!conv.is_real_space());
        assert_relative_eq!(conv.flux(), 3.0, epsilon = 1e-14);
        let expected = gaussian(1.0, 3.0);
        let k = Vector2::new(0.9, -0.4);
        assert_relative_eq!(conv.k_value(&k).re, expected.kval(&k).re, epsilon = 1e-14);
        let p = Vector2::new(0.3, 0.2);
        assert_relative_eq!(conv.x_value(&p), expected.xval(&p), max_relative = 1e-4);
    }

    #[test]
    fn test_auto_selects_real_space_for_pixel() {
        let conv = Convolution::new(vec![gaussian(0.5, 1.0), pixel()], None).unwrap();
        assert!(conv.is_real_space());
        assert!(conv.is_analytic_x());
        let three = Convolution::new(vec![gaussian(0.5, 1.0), pixel(), pixel()], None).unwrap();
        assert!(!three.is_real_space());
        assert!(Convolution::new(vec![gaussian(0.5, 1.0), pixel(), pixel()], Some(true)).is_err());
        assert!(Convolution::new(Vec::new(), None).is_err());
    }

    #[test]
    fn test_real_space_matches_fourier() {
        let g = gaussian(0.4, 1.0);
        let real = Convolution::new(vec![g.clone(), pixel()], Some(true)).unwrap();
        let fourier = Convolution::new(vec![g, pixel()], Some(false)).unwrap();
        for p in [Vector2::new(0.0, 0.0), Vector2::new(0.3, -0.1), Vector2::new(0.6, 0.4)] {
            assert_relative_eq!(real.x_value(&p), fourier.x_value(&p), epsilon = 2e-3);
        }
    }

    #[test]
    fn test_real_space_is_commutative() {
        let e: Profile = Exponential::with_scale_radius(0.3, 1.0).unwrap().into();
        let ab = Convolution::new(vec![e.clone(), pixel()], None).unwrap();
        let ba = Convolution::new(vec![pixel(), e], None).unwrap();
        let p = Vector2::new(0.2, 0.1);
        assert_relative_eq!(ab.x_value(&p), ba.x_value(&p), max_relative = 1e-3);
    }

    #[test]
    fn test_nested_convolutions_flatten() {
        let inner: Profile = Convolution::new(vec![gaussian(1.0, 1.0), gaussian(2.0, 1.0)], None)
            .unwrap()
            .into();
        let outer = Convolution::new(vec![inner, gaussian(0.5, 2.0)], None).unwrap();
        assert_eq!(outer.items().len(), 3);
        assert_relative_eq!(outer.flux(), 2.0);
    }

    #[test]
    fn test_shoot_adds_positions() {
        let shifted = gaussian(0.1, 1.0).shift(1.0, 0.0).unwrap();
        let conv = Convolution::new(vec![shifted, gaussian(0.1, 2.0).shift(0.0, -1.0).unwrap()], None).unwrap();
        assert_relative_eq!(conv.centroid(), Vector2::new(1.0, -1.0));
        let photons = conv.shoot(4000, &mut BaseDeviate::new(17)).unwrap();
        let mx = photons.x().iter().sum::<f64>() / 4000.0;
        let my = photons.y().iter().sum::<f64>() / 4000.0;
        assert_relative_eq!(mx, 1.0, epsilon = 0.02);
        assert_relative_eq!(my, -1.0, epsilon = 0.02);
        assert_relative_eq!(photons.total_flux(), 2.0, epsilon = 1e-9);
    }
}
