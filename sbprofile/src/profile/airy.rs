//! Diffraction pattern of a circular, optionally annular, aperture.
//!
//! In units where `λ/D = 1` the field amplitude at radius `r` is
//!
//! ```text
//! A(r) = [2 J₁(πr)/(πr) - ε² 2 J₁(επr)/(επr)] / (1 - ε²)
//! ```
//!
//! and the surface brightness is `I₀ A(r)²` with `I₀ = π(1 - ε²)/4` for unit
//! flux. The Fourier transform is the pupil autocorrelation, which for an
//! annulus is a combination of circle-overlap areas and vanishes beyond
//! `k = 2π / (λ/D)`.

use std::f64::consts::PI;
use std::sync::Arc;

use log::debug;
use nalgebra::Vector2;
use once_cell::sync::{Lazy, OnceCell};
use profile_math::{bessel_j1, bisect, integrate_panels};
use rustfft::num_complex::Complex64;

use super::{cached_info, find_root, InfoCache, SurfaceBrightness};
use crate::error::{require_finite, require_positive, ProfileError, Result};
use crate::params::GsParams;
use crate::photon::{PhotonArray, RadialSampler};
use crate::random::BaseDeviate;

static AIRY_INFO: InfoCache<AiryInfo> = Lazy::new(Default::default);

/// `2 J₁(x) / x`
fn jinc(x: f64) -> f64 {
    if x.abs() < 1e-8 {
        1.0 - x * x / 8.0
    } else {
        2.0 * bessel_j1(x) / x
    }
}

/// Area of the intersection of two circles with radii `r1`, `r2` whose
/// centres are `d` apart.
fn circle_overlap(r1: f64, r2: f64, d: f64) -> f64 {
    if r1 <= 0.0 || r2 <= 0.0 || d >= r1 + r2 {
        return 0.0;
    }
    if d <= (r1 - r2).abs() {
        let r = r1.min(r2);
        return PI * r * r;
    }
    let c1 = ((d * d + r1 * r1 - r2 * r2) / (2.0 * d * r1)).clamp(-1.0, 1.0);
    let c2 = ((d * d + r2 * r2 - r1 * r1) / (2.0 * d * r2)).clamp(-1.0, 1.0);
    let kite = (-d + r1 + r2) * (d + r1 - r2) * (d - r1 + r2) * (d + r1 + r2);
    r1 * r1 * c1.acos() + r2 * r2 * c2.acos() - 0.5 * kite.max(0.0).sqrt()
}

/// Unit-flux pattern in units of `λ/D`.
#[derive(Debug)]
struct AiryInfo {
    obscuration: f64,
    fwhm: f64,
    half_light_radius: f64,
    /// Folding radius, before the minimum-hlr floor.
    fold_radius: f64,
    gsparams: GsParams,
    sampler: OnceCell<RadialSampler>,
}

impl AiryInfo {
    fn new(obscuration: f64, gsparams: &GsParams) -> Result<Self> {
        let mut info = Self {
            obscuration,
            fwhm: 0.0,
            half_light_radius: 0.0,
            fold_radius: 2.0 / (PI * PI * gsparams.folding_threshold * (1.0 - obscuration)),
            gsparams: gsparams.clone(),
            sampler: OnceCell::new(),
        };
        info.fwhm = info.calculate_fwhm()?;
        info.half_light_radius = info.calculate_half_light_radius()?;
        debug!(
            "airy obscuration={obscuration}: fwhm={:.6}, hlr={:.6} (λ/D)",
            info.fwhm, info.half_light_radius
        );
        Ok(info)
    }

    fn amplitude(&self, r: f64) -> f64 {
        let eps = self.obscuration;
        let x = PI * r;
        if eps == 0.0 {
            jinc(x)
        } else {
            (jinc(x) - eps * eps * jinc(eps * x)) / (1.0 - eps * eps)
        }
    }

    fn central_intensity(&self) -> f64 {
        PI * (1.0 - self.obscuration * self.obscuration) / 4.0
    }

    fn x_unit(&self, r: f64) -> f64 {
        let a = self.amplitude(r);
        self.central_intensity() * a * a
    }

    /// Step out until the pattern falls below half its peak, then bisect.
    fn calculate_fwhm(&self) -> Result<f64> {
        let half = |r: f64| {
            let a = self.amplitude(r);
            a * a - 0.5
        };
        let mut right = 0.05;
        while half(right) > 0.0 {
            right += 0.05;
        }
        let r = bisect(half, right - 0.05, right, 1e-12, 200).map_err(|e| ProfileError::numerical("airy fwhm", e))?;
        Ok(2.0 * r)
    }

    fn enclosed_flux(&self, radius: f64) -> f64 {
        let n = (radius / 0.25).ceil().max(1.0) as usize;
        let edges: Vec<f64> = (0..=n).map(|i| radius * i as f64 / n as f64).collect();
        integrate_panels(|r| 2.0 * PI * r * self.x_unit(r), &edges, 1e-10, 1e-14).value
    }

    fn calculate_half_light_radius(&self) -> Result<f64> {
        find_root("airy half-light radius", |r| Ok(self.enclosed_flux(r) - 0.5), 0.1, 1.0)
    }

    /// Pupil autocorrelation normalised to 1 at `k = 0`.
    fn k_unit(&self, k: f64) -> f64 {
        let eps = self.obscuration;
        let a = PI;
        let b = eps * PI;
        let area = circle_overlap(a, a, k) - 2.0 * circle_overlap(a, b, k) + circle_overlap(b, b, k);
        area / (PI * a * a * (1.0 - eps * eps))
    }

    fn sampler(&self) -> Result<&RadialSampler> {
        self.sampler.get_or_try_init(|| {
            let eps = self.obscuration;
            let r_max = 2.0 / (PI * PI * self.gsparams.shoot_accuracy * (1.0 - eps * eps));
            RadialSampler::from_density(|r| self.x_unit(r), r_max, 4000, 1e-6)
        })
    }
}

#[derive(Debug, Clone)]
pub struct Airy {
    lam_over_d: f64,
    flux: f64,
    gsparams: GsParams,
    info: Arc<AiryInfo>,
}

impl Airy {
    /// `obscuration` is the linear fraction of the aperture blocked by a
    /// central obstruction, in `[0, 1)`.
    pub fn new(lam_over_d: f64, obscuration: f64, flux: f64) -> Result<Self> {
        let lam_over_d = require_positive("lam_over_d", lam_over_d)?;
        if !(0.0..1.0).contains(&obscuration) {
            return Err(ProfileError::invalid(
                "obscuration",
                format!("must lie in [0, 1), got {obscuration}"),
            ));
        }
        Self::build(lam_over_d, obscuration, require_finite("flux", flux)?, GsParams::default())
    }

    fn build(lam_over_d: f64, obscuration: f64, flux: f64, gsparams: GsParams) -> Result<Self> {
        let mut key = vec![obscuration.to_bits()];
        key.extend(gsparams.cache_key());
        let info = cached_info(&AIRY_INFO, key, || AiryInfo::new(obscuration, &gsparams))?;
        Ok(Self {
            lam_over_d,
            flux,
            gsparams,
            info,
        })
    }

    pub fn with_gsparams(self, gsparams: GsParams) -> Result<Self> {
        gsparams.validate()?;
        Self::build(self.lam_over_d, self.info.obscuration, self.flux, gsparams)
    }

    pub fn with_flux(&self, flux: f64) -> Result<Self> {
        Ok(Self {
            flux: require_finite("flux", flux)?,
            ..self.clone()
        })
    }

    pub fn lam_over_d(&self) -> f64 {
        self.lam_over_d
    }

    pub fn obscuration(&self) -> f64 {
        self.info.obscuration
    }

    pub fn fwhm(&self) -> f64 {
        self.info.fwhm * self.lam_over_d
    }

    pub fn half_light_radius(&self) -> f64 {
        self.info.half_light_radius * self.lam_over_d
    }
}

impl SurfaceBrightness for Airy {
    fn kind(&self) -> &'static str {
        "Airy"
    }

    fn x_value(&self, pos: &Vector2<f64>) -> f64 {
        let lod = self.lam_over_d;
        self.flux / (lod * lod) * self.info.x_unit(pos.norm() / lod)
    }

    fn k_value(&self, k: &Vector2<f64>) -> Complex64 {
        Complex64::new(self.flux * self.info.k_unit(k.norm() * self.lam_over_d), 0.0)
    }

    fn flux(&self) -> f64 {
        self.flux
    }

    fn step_k(&self) -> f64 {
        let r = self
            .info
            .fold_radius
            .max(self.gsparams.stepk_minimum_hlr * self.info.half_light_radius);
        PI / (r * self.lam_over_d)
    }

    /// The transform is exactly zero beyond the pupil diameter.
    fn max_k(&self) -> f64 {
        2.0 * PI / self.lam_over_d
    }

    fn is_axisymmetric(&self) -> bool {
        true
    }

    fn has_hard_edges(&self) -> bool {
        false
    }

    fn max_sb(&self) -> f64 {
        let lod = self.lam_over_d;
        self.flux.abs() * self.info.central_intensity() / (lod * lod)
    }

    fn shoot(&self, n: usize, rng: &mut BaseDeviate) -> Result<PhotonArray> {
        let mut photons = self.info.sampler()?.shoot(n, self.flux, rng);
        photons.scale_xy(self.lam_over_d);
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
    fn test_unobscured_constants() {
        let airy = Airy::new(1.0, 0.0, 1.0).unwrap();
        assert_relative_eq!(airy.fwhm(), 1.028_993_969_962_188, epsilon = 1e-9);
        assert_relative_eq!(airy.half_light_radius(), 0.534_832_147_724_265, epsilon = 1e-7);
        assert_relative_eq!(airy.x_value(&Vector2::zeros()), PI / 4.0, epsilon = 1e-14);
    }

    #[test]
    fn test_obscured_fwhm_and_peak() {
        let airy = Airy::new(0.5, 0.3, 2.0).unwrap();
        assert_relative_eq!(airy.fwhm(), 0.5 * 0.981_113_622_669_013, epsilon = 1e-8);
        let peak = 2.0 * PI * (1.0 - 0.09) / (4.0 * 0.25);
        assert_relative_eq!(airy.x_value(&Vector2::zeros()), peak, epsilon = 1e-12);
        assert_relative_eq!(airy.max_sb(), peak, epsilon = 1e-12);
    }

    #[test]
    fn test_unobscured_transfer_function() {
        let airy = Airy::new(0.8, 0.0, 1.0).unwrap();
        for &k in &[0.0, 1.0, 3.0, 6.0, 7.5] {
            let s = k * 0.8 / (2.0 * PI);
            let mtf = 2.0 / PI * (s.acos() - s * (1.0 - s * s).sqrt());
            assert_relative_eq!(airy.k_value(&Vector2::new(k, 0.0)).re, mtf, epsilon = 1e-12);
        }
        assert_eq!(airy.k_value(&Vector2::new(airy.max_k() + 1e-9, 0.0)).re, 0.0);
    }

    #[test]
    fn test_obscured_transfer_function_dc() {
        let airy = Airy::new(1.0, 0.4, 1.5).unwrap();
        assert_relative_eq!(airy.k_value(&Vector2::zeros()).re, 1.5, epsilon = 1e-12);
        assert!(airy.k_value(&Vector2::new(2.0 * PI - 1e-3, 0.0)).re.abs() < 1e-3);
    }

    #[test]
    fn test_jinc_agrees_with_reference_bessel() {
        for &x in &[0.3, 1.0, 3.831_705_970_207_512, 7.5, 20.0] {
            let reference = 2.0 * scilib::math::bessel::j_n(1, x) / x;
            assert_relative_eq!(jinc(x), reference, epsilon = 1e-7);
        }
    }

    #[test]
    fn test_invalid_obscuration() {
        assert!(Airy::new(1.0, 1.0, 1.0).is_err());
        assert!(Airy::new(1.0, -0.1, 1.0).is_err());
        assert!(Airy::new(0.0, 0.0, 1.0).is_err());
    }

    #[test]
    fn test_shoot_half_light_radius() {
        let airy = Airy::new(1.0, 0.0, 1.0).unwrap();
        let photons = airy.shoot(20_000, &mut BaseDeviate::new(5)).unwrap();
        let mut r: Vec<f64> = photons.x().iter().zip(photons.y()).map(|(x, y)| x.hypot(*y)).collect();
        r.sort_by(|a, b| a.total_cmp(b));
        assert_relative_eq!(r[r.len() / 2], airy.half_light_radius(), epsilon = 0.02);
    }
}
