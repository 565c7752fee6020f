//! Long-exposure seeing through Kolmogorov turbulence.
//!
//! Defined in Fourier space, `K(k) = F exp(-(k / k0)^(5/3))` with
//! `k0 = 2.992939 / (λ/r0)`. The real-space profile has no closed form and
//! is tabulated once, in units of `1/k0`, from the inverse Hankel transform.

use std::f64::consts::PI;
use std::sync::Arc;

use log::debug;
use nalgebra::Vector2;
use once_cell::sync::{Lazy, OnceCell};
use profile_math::{bessel_j1, gamma, integrate_panels};
use rustfft::num_complex::Complex64;

use super::hankel::{hankel_inverse, LogTable};
use super::{cached_info, find_root, InfoCache, SurfaceBrightness};
use crate::error::{require_finite, require_positive, Result};
use crate::params::GsParams;
use crate::photon::{PhotonArray, RadialSampler};
use crate::random::BaseDeviate;

/// `k0 * (λ/r0)`
pub const K0_FACTOR: f64 = 2.992_939;

static KOLMOGOROV_INFO: InfoCache<KolmogorovInfo> = Lazy::new(Default::default);

/// Beyond this `exp(-k^(5/3))` is below double precision.
const K_MAX_UNIT: f64 = 9.0;
const X_TABLE_MAX_R: f64 = 100.0;

fn k_unit(k: f64) -> f64 {
    (-k.powf(5.0 / 3.0)).exp()
}

/// Flux fraction inside radius `r`: `r ∫ K(k) J₁(k r) dk`.
fn enclosed_fraction(r: f64) -> f64 {
    if r <= 0.0 {
        return 0.0;
    }
    let half_period = PI / r;
    let n = (K_MAX_UNIT / half_period).ceil().max(4.0) as usize;
    let edges: Vec<f64> = (0..=n).map(|i| K_MAX_UNIT * i as f64 / n as f64).collect();
    r * integrate_panels(|k| k_unit(k) * bessel_j1(k * r), &edges, 1e-10, 1e-14).value
}

/// Unit-flux profile in units of `1/k0`.
#[derive(Debug)]
struct KolmogorovInfo {
    x_zero: f64,
    x_table: LogTable,
    half_light_radius: f64,
    fwhm: f64,
    fold_radius: f64,
    gsparams: GsParams,
    sampler: OnceCell<RadialSampler>,
}

impl KolmogorovInfo {
    fn new(gsparams: &GsParams) -> Result<Self> {
        // (1/2π) ∫ k exp(-k^(5/3)) dk = (3/5) Γ(6/5) / 2π
        let x_zero = 0.6 * gamma(1.2) / (2.0 * PI);
        let x_table = LogTable::build(
            |r| hankel_inverse(&k_unit, r, K_MAX_UNIT, 1e-9, 1e-15),
            x_zero,
            1e-2,
            X_TABLE_MAX_R,
            0.05,
            0.0,
        )?;
        let half_light_radius = find_root("kolmogorov half-light radius", |r| Ok(enclosed_fraction(r) - 0.5), 0.5, 1.0)?;
        let half_max = find_root(
            "kolmogorov fwhm",
            |r| Ok(0.5 * x_zero - x_table.eval(r)),
            0.5,
            1.0,
        )?;
        let fold = find_root(
            "kolmogorov folding radius",
            |r| Ok(enclosed_fraction(r) - (1.0 - gsparams.folding_threshold)),
            half_light_radius,
            2.0 * half_light_radius,
        )?;
        debug!("kolmogorov: hlr={half_light_radius:.6}, fold radius={fold:.4} (1/k0)");
        Ok(Self {
            x_zero,
            x_table,
            half_light_radius,
            fwhm: 2.0 * half_max,
            fold_radius: fold.max(gsparams.stepk_minimum_hlr * half_light_radius),
            gsparams: gsparams.clone(),
            sampler: OnceCell::new(),
        })
    }

    fn x_unit(&self, r: f64) -> f64 {
        self.x_table.eval(r)
    }

    fn sampler(&self) -> Result<&RadialSampler> {
        self.sampler.get_or_try_init(|| {
            let deficit = self.gsparams.shoot_accuracy;
            let r_max = find_root(
                "kolmogorov shooting radius",
                |r| Ok(enclosed_fraction(r) - (1.0 - deficit)),
                self.fold_radius,
                2.0 * self.fold_radius,
            )?;
            RadialSampler::from_density(|r| self.x_unit(r), r_max, 4000, 1e-6)
        })
    }
}

#[derive(Debug, Clone)]
pub struct Kolmogorov {
    lam_over_r0: f64,
    flux: f64,
    gsparams: GsParams,
    info: Arc<KolmogorovInfo>,
}

impl Kolmogorov {
    pub fn new(lam_over_r0: f64, flux: f64) -> Result<Self> {
        Self::build(
            require_positive("lam_over_r0", lam_over_r0)?,
            require_finite("flux", flux)?,
            GsParams::default(),
        )
    }

    pub fn with_fwhm(fwhm: f64, flux: f64) -> Result<Self> {
        let fwhm = require_positive("fwhm", fwhm)?;
        let unit = Self::new(1.0, flux)?;
        Self::build(fwhm / unit.fwhm(), unit.flux, unit.gsparams)
    }

    pub fn with_half_light_radius(hlr: f64, flux: f64) -> Result<Self> {
        let hlr = require_positive("half_light_radius", hlr)?;
        let unit = Self::new(1.0, flux)?;
        Self::build(hlr / unit.half_light_radius(), unit.flux, unit.gsparams)
    }

    fn build(lam_over_r0: f64, flux: f64, gsparams: GsParams) -> Result<Self> {
        let info = cached_info(&KOLMOGOROV_INFO, gsparams.cache_key(), || KolmogorovInfo::new(&gsparams))?;
        Ok(Self {
            lam_over_r0,
            flux,
            gsparams,
            info,
        })
    }

    pub fn with_gsparams(self, gsparams: GsParams) -> Result<Self> {
        gsparams.validate()?;
        Self::build(self.lam_over_r0, self.flux, gsparams)
    }

    pub fn with_flux(&self, flux: f64) -> Result<Self> {
        Ok(Self {
            flux: require_finite("flux", flux)?,
            ..self.clone()
        })
    }

    pub fn lam_over_r0(&self) -> f64 {
        self.lam_over_r0
    }

    fn k0(&self) -> f64 {
        K0_FACTOR / self.lam_over_r0
    }

    pub fn half_light_radius(&self) -> f64 {
        self.info.half_light_radius / self.k0()
    }

    pub fn fwhm(&self) -> f64 {
        self.info.fwhm / self.k0()
    }
}

impl SurfaceBrightness for Kolmogorov {
    fn kind(&self) -> &'static str {
        "Kolmogorov"
    }

    fn x_value(&self, pos: &Vector2<f64>) -> f64 {
        let k0 = self.k0();
        self.flux * k0 * k0 * self.info.x_unit(pos.norm() * k0)
    }

    fn k_value(&self, k: &Vector2<f64>) -> Complex64 {
        Complex64::new(self.flux * k_unit(k.norm() / self.k0()), 0.0)
    }

    fn flux(&self) -> f64 {
        self.flux
    }

    fn step_k(&self) -> f64 {
        PI * self.k0() / self.info.fold_radius
    }

    fn max_k(&self) -> f64 {
        self.k0() * (-self.gsparams.maxk_threshold.ln()).powf(0.6)
    }

    fn is_axisymmetric(&self) -> bool {
        true
    }

    fn has_hard_edges(&self) -> bool {
        false
    }

    fn max_sb(&self) -> f64 {
        let k0 = self.k0();
        self.flux.abs() * k0 * k0 * self.info.x_zero
    }

    fn shoot(&self, n: usize, rng: &mut BaseDeviate) -> Result<PhotonArray> {
        let mut photons = self.info.sampler()?.shoot(n, self.flux, rng);
        photons.scale_xy(1.0 / self.k0());
        Ok(photons)
    }

    fn gsparams(&self) -> &GsParams {
        &self.gsparams
    }
}
