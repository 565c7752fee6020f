//! Sersic profile `I(r) ∝ exp(-b (r / re)^(1/n))`, with `b` chosen so that
//! `re` is the half-light radius.
//!
//! The shape depends only on `n`, so everything expensive (the Hankel
//! table for `k_value`, the photon sampler) is computed once per index in
//! units of `re` and shared between instances through a process-wide cache.

use std::f64::consts::PI;
use std::sync::Arc;

use log::debug;
use nalgebra::Vector2;
use once_cell::sync::{Lazy, OnceCell};
use profile_math::{gamma_p, gamma_q, ln_gamma};
use rustfft::num_complex::Complex64;

use super::hankel::{hankel_forward, LogTable};
use super::{cached_info, find_root, InfoCache, SurfaceBrightness};
use crate::error::{require_finite, require_positive, ProfileError, Result};
use crate::params::GsParams;
use crate::photon::{PhotonArray, RadialSampler};
use crate::random::BaseDeviate;

pub const MIN_INDEX: f64 = 0.3;
pub const MAX_INDEX: f64 = 6.2;

static SERSIC_INFO: InfoCache<SersicInfo> = Lazy::new(Default::default);

/// `b` such that half the flux of `exp(-b r^(1/n))` lies inside `r = 1`.
pub fn b_coefficient(n: f64) -> Result<f64> {
    find_root("sersic b coefficient", |b| Ok(gamma_p(2.0 * n, b)? - 0.5), 1e-6, 2.0 * n + 1.0)
}

/// Shape data in units of the half-light radius, for unit flux.
#[derive(Debug)]
struct SersicInfo {
    n: f64,
    b: f64,
    /// Central surface brightness.
    x_norm: f64,
    /// Radius beyond which only `folding_threshold` of the flux remains.
    fold_radius: f64,
    gsparams: GsParams,
    k_table: LogTable,
    sampler: OnceCell<RadialSampler>,
}

impl SersicInfo {
    fn new(n: f64, gsparams: &GsParams) -> Result<Self> {
        let b = b_coefficient(n)?;
        let two_n = 2.0 * n;
        // ∫ 2π r exp(-b r^(1/n)) dr = 2π n Γ(2n) / b^(2n)
        let flux_1 = 2.0 * PI * n * (ln_gamma(two_n) - two_n * b.ln()).exp();
        let x_fold = find_root(
            "sersic folding radius",
            |x| Ok(gamma_q(two_n, x)? - gsparams.folding_threshold),
            b,
            2.0 * b,
        )?;
        let fold_radius = (x_fold / b).powf(n).max(gsparams.stepk_minimum_hlr);
        debug!("sersic n={n}: b={b:.8}, fold radius {fold_radius:.3} hlr");
        let x_norm = 1.0 / flux_1;
        let k_table = build_k_table(n, b, x_norm, gsparams)?;
        Ok(Self {
            n,
            b,
            x_norm,
            fold_radius,
            gsparams: gsparams.clone(),
            k_table,
            sampler: OnceCell::new(),
        })
    }

    fn x_unit(&self, r: f64) -> f64 {
        self.x_norm * (-self.b * r.powf(1.0 / self.n)).exp()
    }

    fn sampler(&self) -> Result<&RadialSampler> {
        self.sampler.get_or_try_init(|| {
            let two_n = 2.0 * self.n;
            let r_max = radius_enclosing(self.n, self.b, self.gsparams.shoot_accuracy)?;
            let cumulative = |r: f64| {
                gamma_p(two_n, self.b * r.powf(1.0 / self.n)).map_err(|e| ProfileError::numerical("sersic enclosed flux", e))
            };
            RadialSampler::from_cumulative(cumulative, r_max, 4000)
        })
    }
}

/// Radius containing all but `fraction` of the flux, in units of `re`.
fn radius_enclosing(n: f64, b: f64, fraction: f64) -> Result<f64> {
    let x = find_root("sersic outer radius", |x| Ok(gamma_q(2.0 * n, x)? - fraction), b, 2.0 * b)?;
    Ok((x / b).powf(n))
}

/// Unit-flux transform against `k re`.
fn build_k_table(n: f64, b: f64, x_norm: f64, gsparams: &GsParams) -> Result<LogTable> {
    let abs_tol = 0.1 * gsparams.kvalue_accuracy;
    let r_max = radius_enclosing(n, b, 1e-3 * gsparams.kvalue_accuracy)?;
    let f = |r: f64| x_norm * (-b * r.powf(1.0 / n)).exp();
    let transform = |k: f64| {
        let r_stop = truncation_radius(&f, k, r_max, abs_tol);
        hankel_forward(&f, k, r_stop, 1e-8, 1e-2 * abs_tol)
    };
    LogTable::build(transform, 1.0, 1e-3, 1e4, 0.05, abs_tol)
}

/// Outer radius for a Hankel integral at high `k`: the oscillating tail
/// beyond it is bounded by its amplitude over half a period.
fn truncation_radius<F: Fn(f64) -> f64>(f: &F, k: f64, r_max: f64, abs_tol: f64) -> f64 {
    let envelope = |r: f64| 2.0 * PI * r * f(r) * (2.0 / (PI * k * r)).sqrt() * PI / k;
    let mut r = r_max;
    while k * r > 40.0 && envelope(0.5 * r) < abs_tol {
        r *= 0.5;
    }
    r
}

fn check_index(n: f64) -> Result<f64> {
    if (MIN_INDEX..=MAX_INDEX).contains(&n) {
        Ok(n)
    } else {
        Err(ProfileError::invalid("n", format!("sersic index {n} outside [{MIN_INDEX}, {MAX_INDEX}]")))
    }
}

#[derive(Debug, Clone)]
pub struct Sersic {
    half_light_radius: f64,
    flux: f64,
    gsparams: GsParams,
    info: Arc<SersicInfo>,
}

impl Sersic {
    pub fn with_half_light_radius(n: f64, hlr: f64, flux: f64) -> Result<Self> {
        Self::build(
            check_index(n)?,
            require_positive("half_light_radius", hlr)?,
            require_finite("flux", flux)?,
            GsParams::default(),
        )
    }

    /// `scale_radius` is `r0` in `exp(-(r / r0)^(1/n))`.
    pub fn with_scale_radius(n: f64, scale_radius: f64, flux: f64) -> Result<Self> {
        let r0 = require_positive("scale_radius", scale_radius)?;
        let n = check_index(n)?;
        Self::with_half_light_radius(n, r0 * b_coefficient(n)?.powf(n), flux)
    }

    /// The `n = 4` bulge profile.
    pub fn de_vaucouleurs(hlr: f64, flux: f64) -> Result<Self> {
        Self::with_half_light_radius(4.0, hlr, flux)
    }

    fn build(n: f64, half_light_radius: f64, flux: f64, gsparams: GsParams) -> Result<Self> {
        let mut key = vec![n.to_bits()];
        key.extend(gsparams.cache_key());
        let info = cached_info(&SERSIC_INFO, key, || SersicInfo::new(n, &gsparams))?;
        Ok(Self {
            half_light_radius,
            flux,
            gsparams,
            info,
        })
    }

    pub fn with_gsparams(self, gsparams: GsParams) -> Result<Self> {
        gsparams.validate()?;
        Self::build(self.info.n, self.half_light_radius, self.flux, gsparams)
    }

    pub fn with_flux(&self, flux: f64) -> Result<Self> {
        Ok(Self {
            flux: require_finite("flux", flux)?,
            ..self.clone()
        })
    }

    pub fn n(&self) -> f64 {
        self.info.n
    }

    pub fn half_light_radius(&self) -> f64 {
        self.half_light_radius
    }

    pub fn scale_radius(&self) -> f64 {
        self.half_light_radius / self.info.b.powf(self.info.n)
    }
}

impl SurfaceBrightness for Sersic {
    fn kind(&self) -> &'static str {
        "Sersic"
    }

    fn x_value(&self, pos: &Vector2<f64>) -> f64 {
        let re = self.half_light_radius;
        self.flux / (re * re) * self.info.x_unit(pos.norm() / re)
    }

    fn k_value(&self, k: &Vector2<f64>) -> Complex64 {
        let kr = k.norm() * self.half_light_radius;
        if kr == 0.0 {
            return Complex64::new(self.flux, 0.0);
        }
        Complex64::new(self.flux * self.info.k_table.eval(kr), 0.0)
    }

    fn flux(&self) -> f64 {
        self.flux
    }

    fn step_k(&self) -> f64 {
        PI / (self.info.fold_radius * self.half_light_radius)
    }

    fn max_k(&self) -> f64 {
        self.info.k_table.last_above(self.gsparams.maxk_threshold) / self.half_light_radius
    }

    fn is_axisymmetric(&self) -> bool {
        true
    }

    fn has_hard_edges(&self) -> bool {
        false
    }

    fn max_sb(&self) -> f64 {
        let re = self.half_light_radius;
        self.flux.abs() * self.info.x_norm / (re * re)
    }

    fn shoot(&self, n: usize, rng: &mut BaseDeviate) -> Result<PhotonArray> {
        let mut photons = self.info.sampler()?.shoot(n, self.flux, rng);
        photons.scale_xy(self.half_light_radius);
        Ok(photons)
    }

    fn gsparams(&self) -> &GsParams {
        &self.gsparams
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::Exponential;
    use approx::assert_relative_eq;
    use profile_math::integrate;

    #[test]
    fn test_b_coefficient() {
        assert_relative_eq!(b_coefficient(1.0).unwrap(), 1.678_346_99, epsilon = 1e-7);
        assert_relative_eq!(b_coefficient(4.0).unwrap(), 7.669_249_44, epsilon = 1e-7);
    }

    #[test]
    fn test_index_range() {
        assert!(Sersic::with_half_light_radius(0.2, 1.0, 1.0).is_err());
        assert!(Sersic::with_half_light_radius(6.5, 1.0, 1.0).is_err());
        assert!(Sersic::with_half_light_radius(1.5, -1.0, 1.0).is_err());
    }

    #[test]
    fn test_half_light_radius_encloses_half() {
        for &n in &[1.5, 2.5] {
            let s = Sersic::with_half_light_radius(n, 1.8, 1.0).unwrap();
            let inside = integrate(
                |r| 2.0 * PI * r * s.x_value(&Vector2::new(r, 0.0)),
                0.0,
                1.8,
                1e-10,
                0.0,
            );
            assert_relative_eq!(inside.value, 0.5, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_n1_matches_exponential() {
        let s = Sersic::with_half_light_radius(1.0, 1.3, 2.0).unwrap();
        let e = Exponential::with_half_light_radius(1.3, 2.0).unwrap();
        for &k in &[0.0, 0.3, 1.0, 4.0, 20.0] {
            let kv = Vector2::new(k, 0.0);
            assert_relative_eq!(s.k_value(&kv).re, e.k_value(&kv).re, epsilon = 2e-5);
        }
        assert_relative_eq!(s.x_value(&Vector2::new(0.4, 0.2)), e.x_value(&Vector2::new(0.4, 0.2)), max_relative = 1e-6);
        assert_relative_eq!(s.scale_radius(), e.scale_radius(), max_relative = 1e-8);
    }

    #[test]
    fn test_scale_radius_round_trip() {
        let s = Sersic::with_scale_radius(2.5, 0.4, 1.0).unwrap();
        assert_relative_eq!(s.scale_radius(), 0.4, max_relative = 1e-10);
    }

    #[test]
    fn test_de_vaucouleurs_has_finite_max_k() {
        let d = Sersic::de_vaucouleurs(1.0, 1.0).unwrap();
        assert_eq!(d.n(), 4.0);
        let k = d.max_k();
        assert!(k.is_finite() && k > 10.0);
        assert!(d.step_k() <= PI / 5.0 + 1e-12);
    }

    #[test]
    fn test_transform_is_finite_across_index_range() {
        for &n in &[MIN_INDEX, 0.5, 1.0, 2.5, 4.0, MAX_INDEX] {
            let s = Sersic::with_half_light_radius(n, 1.0, 2.0).unwrap();
            let k_max = s.max_k();
            assert!(k_max.is_finite() && k_max > 0.0, "n = {n}: max_k {k_max}");
            for &k in &[0.1, 1.0, 10.0, k_max, 10.0 * k_max] {
                let v = s.k_value(&Vector2::new(k, 0.0)).re;
                assert!(v.is_finite() && v.abs() <= 2.0 + 1e-9, "n = {n}, k = {k}: {v}");
            }
        }
    }

    #[test]
    fn test_shoot_median_radius() {
        let s = Sersic::with_half_light_radius(2.5, 1.0, 1.0).unwrap();
        let photons = s.shoot(20_000, &mut BaseDeviate::new(9)).unwrap();
        let mut r: Vec<f64> = photons.x().iter().zip(photons.y()).map(|(x, y)| x.hypot(*y)).collect();
        r.sort_by(|a, b| a.total_cmp(b));
        assert_relative_eq!(r[r.len() / 2], 1.0, epsilon = 0.03);
    }
}
