//! Moffat profile `I(r) ∝ (1 + (r / rd)²)^(-β)`, optionally truncated at
//! `r = trunc`.
//!
//! Shape data lives in units of the scale radius `rd` and is shared per
//! `(β, trunc / rd)` through the process-wide cache. The Fourier transform of
//! the untruncated profile is analytic (a `K_ν` Bessel function) and is
//! tabulated on a log grid; the truncated profile's transform rings, so it
//! is tabulated on a linear grid fine enough to follow the ringing.

use std::f64::consts::PI;
use std::sync::Arc;

use log::debug;
use nalgebra::Vector2;
use once_cell::sync::Lazy;
use profile_math::{bessel_k, ln_gamma, ConvergenceError, Interpolation, Table};
use rustfft::num_complex::Complex64;

use super::hankel::{hankel_forward, LogTable};
use super::{cached_info, find_root, shoot_radial, InfoCache, Support, SurfaceBrightness};
use crate::error::{require_finite, require_positive, ProfileError, Result};
use crate::params::GsParams;
use crate::photon::PhotonArray;
use crate::random::BaseDeviate;

static MOFFAT_INFO: InfoCache<MoffatInfo> = Lazy::new(Default::default);

/// Samples per half oscillation of a truncated profile's transform.
const RING_SAMPLING: f64 = 10.0;
const MAX_RING_SAMPLES: usize = 8000;

#[derive(Debug)]
enum KTable {
    /// `K(k)` against `ln k`.
    Smooth(LogTable),
    /// `K(k)` on a uniform grid starting at `k = 0`; zero past the end.
    Ringing(Table),
}

impl KTable {
    fn eval(&self, k: f64) -> f64 {
        match self {
            KTable::Smooth(t) => t.eval(k),
            KTable::Ringing(t) => {
                if k > t.arg_max() {
                    0.0
                } else {
                    t.eval_clamped(k)
                }
            }
        }
    }

    fn last_above(&self, threshold: f64) -> f64 {
        match self {
            KTable::Smooth(t) => t.last_above(threshold),
            KTable::Ringing(t) => t
                .args()
                .iter()
                .zip(t.vals())
                .rev()
                .find(|(_, v)| v.abs() >= threshold)
                .map_or(t.arg_min(), |(k, _)| *k),
        }
    }
}

/// Unit-flux shape in units of `rd`.
#[derive(Debug)]
struct MoffatInfo {
    beta: f64,
    /// Truncation radius in units of `rd`; zero when untruncated.
    trunc: f64,
    /// Fraction of the untruncated flux inside `trunc`.
    flux_fraction: f64,
    norm: f64,
    k_table: KTable,
}

impl MoffatInfo {
    fn new(beta: f64, trunc: f64, gsparams: &GsParams) -> Result<Self> {
        let flux_fraction = enclosed_fraction(beta, trunc);
        let norm = (beta - 1.0) / (PI * flux_fraction);
        let k_table = if trunc > 0.0 {
            build_ringing_table(|r| x_unit(beta, trunc, norm, r), trunc, gsparams)?
        } else {
            build_smooth_table(beta, gsparams)?
        };
        Ok(Self {
            beta,
            trunc,
            flux_fraction,
            norm,
            k_table,
        })
    }

    fn x_unit(&self, r: f64) -> f64 {
        x_unit(self.beta, self.trunc, self.norm, r)
    }

    /// Radius enclosing `fraction` of the (possibly truncated) flux.
    fn radius_enclosing(&self, fraction: f64) -> f64 {
        ((1.0 - fraction * self.flux_fraction).powf(1.0 / (1.0 - self.beta)) - 1.0).sqrt()
    }

}

/// Unit-flux profile in units of `rd`; `trunc = 0` means untruncated.
fn x_unit(beta: f64, trunc: f64, norm: f64, r: f64) -> f64 {
    if trunc > 0.0 && r > trunc {
        0.0
    } else {
        norm * (1.0 + r * r).powf(-beta)
    }
}

fn build_smooth_table(beta: f64, gsparams: &GsParams) -> Result<KTable> {
    // 2 (k/2)^ν K_ν(k) / Γ(ν) with ν = β - 1
    let nu = beta - 1.0;
    let ln_norm = std::f64::consts::LN_2 - ln_gamma(nu);
    let f = |k: f64| (ln_norm + nu * (0.5 * k).ln()).exp() * bessel_k(nu, k);
    let stop = 0.1 * gsparams.kvalue_accuracy;
    Ok(KTable::Smooth(LogTable::build(f, 1.0, 1e-3, 1e3, 0.05, stop)?))
}

fn build_ringing_table<F: Fn(f64) -> f64>(f: F, trunc: f64, gsparams: &GsParams) -> Result<KTable> {
    let abs_tol = 0.1 * gsparams.kvalue_accuracy;
    let stop = 0.2 * gsparams.maxk_threshold;
    let window = (2.0 * RING_SAMPLING) as usize;
    let dk = PI / (RING_SAMPLING * trunc);
    let mut args = Vec::new();
    let mut vals = Vec::new();
    while args.len() < MAX_RING_SAMPLES {
        let k = args.len() as f64 * dk;
        let v = if k == 0.0 { 1.0 } else { hankel_forward(&f, k, trunc, 1e-8, abs_tol) };
        if !v.is_finite() {
            return Err(ProfileError::numerical("moffat k table", ConvergenceError::NonFinite { at: k, value: v }));
        }
        args.push(k);
        vals.push(v);
        if vals.len() > window && vals[vals.len() - window..].iter().all(|v| v.abs() < stop) {
            break;
        }
    }
    debug!("truncated moffat k table: {} samples to k = {:.3}", args.len(), args.last().copied().unwrap_or(0.0));
    Ok(KTable::Ringing(Table::new(args, vals, Interpolation::Spline)?))
}

/// Fraction of an untruncated Moffat's flux inside radius `t` (in `rd`).
fn enclosed_fraction(beta: f64, t: f64) -> f64 {
    if t > 0.0 {
        1.0 - (1.0 + t * t).powf(1.0 - beta)
    } else {
        1.0
    }
}

#[derive(Debug, Clone)]
pub struct Moffat {
    scale_radius: f64,
    flux: f64,
    gsparams: GsParams,
    info: Arc<MoffatInfo>,
}

fn check_beta(beta: f64) -> Result<f64> {
    if beta.is_finite() && beta > 1.0 {
        Ok(beta)
    } else {
        Err(ProfileError::invalid("beta", format!("moffat beta must exceed 1, got {beta}")))
    }
}

fn check_trunc(trunc: f64) -> Result<f64> {
    if trunc.is_finite() && trunc >= 0.0 {
        Ok(trunc)
    } else {
        Err(ProfileError::invalid("trunc", format!("must be zero or positive, got {trunc}")))
    }
}

impl Moffat {
    /// `trunc = 0` leaves the profile untruncated.
    pub fn with_scale_radius(beta: f64, scale_radius: f64, trunc: f64, flux: f64) -> Result<Self> {
        Self::build(
            check_beta(beta)?,
            require_positive("scale_radius", scale_radius)?,
            check_trunc(trunc)?,
            require_finite("flux", flux)?,
            GsParams::default(),
        )
    }

    pub fn with_fwhm(beta: f64, fwhm: f64, trunc: f64, flux: f64) -> Result<Self> {
        let beta = check_beta(beta)?;
        let fwhm = require_positive("fwhm", fwhm)?;
        Self::with_scale_radius(beta, fwhm / fwhm_factor(beta), trunc, flux)
    }

    /// With truncation the scale radius is solved for, which needs
    /// `hlr < trunc / √2`.
    pub fn with_half_light_radius(beta: f64, hlr: f64, trunc: f64, flux: f64) -> Result<Self> {
        let beta = check_beta(beta)?;
        let hlr = require_positive("half_light_radius", hlr)?;
        let trunc = check_trunc(trunc)?;
        let scale_radius = if trunc == 0.0 {
            hlr / (2.0_f64.powf(1.0 / (beta - 1.0)) - 1.0).sqrt()
        } else {
            if hlr >= trunc * std::f64::consts::FRAC_1_SQRT_2 {
                return Err(ProfileError::invalid(
                    "half_light_radius",
                    format!("{hlr} is too large for truncation radius {trunc}"),
                ));
            }
            // enclosed fraction at hlr falls from 1 toward (hlr/trunc)² as rd grows
            find_root(
                "moffat scale radius",
                |rd| {
                    let inside = enclosed_fraction(beta, hlr / rd) / enclosed_fraction(beta, trunc / rd);
                    Ok(inside - 0.5)
                },
                1e-3 * hlr,
                hlr,
            )?
        };
        Self::with_scale_radius(beta, scale_radius, trunc, flux)
    }

    fn build(beta: f64, scale_radius: f64, trunc: f64, flux: f64, gsparams: GsParams) -> Result<Self> {
        let t = trunc / scale_radius;
        let mut key = vec![beta.to_bits(), t.to_bits()];
        key.extend(gsparams.cache_key());
        let info = cached_info(&MOFFAT_INFO, key, || MoffatInfo::new(beta, t, &gsparams))?;
        Ok(Self {
            scale_radius,
            flux,
            gsparams,
            info,
        })
    }

    pub fn with_gsparams(self, gsparams: GsParams) -> Result<Self> {
        gsparams.validate()?;
        Self::build(self.info.beta, self.scale_radius, self.trunc(), self.flux, gsparams)
    }

    pub fn with_flux(&self, flux: f64) -> Result<Self> {
        Ok(Self {
            flux: require_finite("flux", flux)?,
            ..self.clone()
        })
    }

    pub fn beta(&self) -> f64 {
        self.info.beta
    }

    pub fn scale_radius(&self) -> f64 {
        self.scale_radius
    }

    /// Zero when untruncated.
    pub fn trunc(&self) -> f64 {
        self.info.trunc * self.scale_radius
    }

    pub fn fwhm(&self) -> f64 {
        self.scale_radius * fwhm_factor(self.info.beta)
    }

    pub fn half_light_radius(&self) -> f64 {
        self.scale_radius * self.info.radius_enclosing(0.5)
    }
}

fn fwhm_factor(beta: f64) -> f64 {
    2.0 * (2.0_f64.powf(1.0 / beta) - 1.0).sqrt()
}

impl SurfaceBrightness for Moffat {
    fn kind(&self) -> &'static str {
        "Moffat"
    }

    fn x_value(&self, pos: &Vector2<f64>) -> f64 {
        let rd = self.scale_radius;
        self.flux / (rd * rd) * self.info.x_unit(pos.norm() / rd)
    }

    fn k_value(&self, k: &Vector2<f64>) -> Complex64 {
        let kr = k.norm() * self.scale_radius;
        if kr == 0.0 {
            return Complex64::new(self.flux, 0.0);
        }
        Complex64::new(self.flux * self.info.k_table.eval(kr), 0.0)
    }

    fn flux(&self) -> f64 {
        self.flux
    }

    fn step_k(&self) -> f64 {
        let info = &self.info;
        let r = if info.trunc > 0.0 {
            info.trunc
        } else {
            let fold = (self.gsparams.folding_threshold.powf(1.0 / (1.0 - info.beta)) - 1.0).sqrt();
            fold.max(self.gsparams.stepk_minimum_hlr * info.radius_enclosing(0.5))
        };
        PI / (r * self.scale_radius)
    }

    fn max_k(&self) -> f64 {
        self.info.k_table.last_above(self.gsparams.maxk_threshold) / self.scale_radius
    }

    fn is_axisymmetric(&self) -> bool {
        true
    }

    /// The truncation edge is a step, but a shallow one; the profile is
    /// still rendered by FFT.
    fn has_hard_edges(&self) -> bool {
        false
    }

    fn support(&self) -> Support {
        if self.info.trunc > 0.0 {
            Support::disk(Vector2::zeros(), self.trunc())
        } else {
            Support::Unbounded
        }
    }

    fn max_sb(&self) -> f64 {
        self.flux.abs() * self.info.norm / (self.scale_radius * self.scale_radius)
    }

    fn shoot(&self, n: usize, rng: &mut BaseDeviate) -> Result<PhotonArray> {
        let info = Arc::clone(&self.info);
        Ok(shoot_radial(n, self.flux, self.scale_radius, rng, move |rng| {
            info.radius_enclosing(rng.uniform())
        }))
    }

    fn gsparams(&self) -> &GsParams {
        &self.gsparams
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use profile_math::integrate;

    const FWHM: f64 = 1.468_623_249_677_186_7;

    #[test]
    fn test_truncated_properties() {
        let by_fwhm = Moffat::with_fwhm(2.0, FWHM, 2.0 * FWHM, 1.8).unwrap();
        let by_hlr = Moffat::with_half_light_radius(2.0, 1.0, 2.0 * FWHM, 1.8).unwrap();
        for m in [&by_fwhm, &by_hlr] {
            assert_eq!(m.centroid(), Vector2::zeros());
            assert_relative_eq!(m.step_k(), 1.069_570_652_064_896_9, epsilon = 1e-7);
            assert_relative_eq!(m.k_value(&Vector2::zeros()).re, 1.8);
            assert_relative_eq!(m.half_light_radius(), 1.0, epsilon = 1e-7);
            assert_relative_eq!(m.fwhm(), FWHM, epsilon = 1e-7);
            assert_relative_eq!(m.x_value(&Vector2::zeros()), 0.506_546_516_382_425_09, epsilon = 1e-7);
        }
    }

    #[test]
    fn test_untruncated_transform() {
        // β = 1.5 has K(k) = exp(-k rd)
        let m = Moffat::with_scale_radius(1.5, 0.8, 0.0, 1.0).unwrap();
        for &k in &[0.1, 1.0, 3.0, 6.0] {
            assert_relative_eq!(m.k_value(&Vector2::new(k, 0.0)).re, (-k * 0.8).exp(), epsilon = 2e-6);
        }
        assert_relative_eq!(m.max_k(), -(1e-3_f64).ln() / 0.8, max_relative = 0.05);
    }

    #[test]
    fn test_truncated_transform_matches_quadrature() {
        let m = Moffat::with_scale_radius(3.0, 1.0, 3.0, 1.0).unwrap();
        let x = |r: f64| m.x_value(&Vector2::new(r, 0.0));
        for &k in &[0.5, 2.0, 5.0] {
            let direct = hankel_forward(&x, k, 3.0, 1e-10, 1e-12);
            assert_relative_eq!(m.k_value(&Vector2::new(k, 0.0)).re, direct, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_transform_is_finite_for_every_shape() {
        for &beta in &[1.1, 1.5, 2.5, 4.5] {
            for &trunc in &[0.0, 1.5, 6.0] {
                let m = Moffat::with_scale_radius(beta, 1.0, trunc, 1.0).unwrap();
                let k_max = m.max_k();
                assert!(k_max.is_finite() && k_max > 0.0, "beta {beta}, trunc {trunc}: max_k {k_max}");
                for &k in &[0.2, 2.0, k_max, 5.0 * k_max] {
                    let v = m.k_value(&Vector2::new(k, 0.0)).re;
                    assert!(v.is_finite() && v.abs() <= 1.0 + 1e-9, "beta {beta}, trunc {trunc}, k {k}: {v}");
                }
            }
        }
    }

    #[test]
    fn test_half_light_radius_encloses_half() {
        let m = Moffat::with_half_light_radius(2.0, 1.8, 0.0, 1.0).unwrap();
        let inside = integrate(|r| 2.0 * PI * r * m.x_value(&Vector2::new(r, 0.0)), 0.0, 1.8, 1e-10, 0.0);
        assert_relative_eq!(inside.value, 0.5, epsilon = 1e-4);
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(Moffat::with_scale_radius(1.0, 1.0, 0.0, 1.0).is_err());
        assert!(Moffat::with_scale_radius(2.0, 1.0, -1.0, 1.0).is_err());
        assert!(Moffat::with_half_light_radius(2.0, 1.0, 1.2, 1.0).is_err());
    }

    #[test]
    fn test_shoot_respects_truncation() {
        let m = Moffat::with_scale_radius(2.5, 1.0, 2.0, 1.0).unwrap();
        let photons = m.shoot(5000, &mut BaseDeviate::new(3)).unwrap();
        assert!(photons.x().iter().zip(photons.y()).all(|(x, y)| x.hypot(*y) <= 2.0 + 1e-9));
        assert_relative_eq!(photons.total_flux(), 1.0, epsilon = 1e-12);
    }
}
