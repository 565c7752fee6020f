//! Surface-brightness profiles.
//!
//! A [`Profile`] is an immutable tree: atomic shapes at the leaves, with
//! [`Sum`], [`Convolution`] and [`Transformed`] nodes above them. Every
//! node answers the same questions through [`SurfaceBrightness`]: its
//! real-space value, its Fourier value, its flux, and the Fourier sampling
//! it needs (`step_k`, `max_k`).
//!
//! Fourier conventions: `k_value(k) = ∫ x_value(x) exp(-i k·x) d²x`, so
//! `k_value(0) == flux` for every profile.
//!
//! ```
//! use sbprofile::profile::{Gaussian, Profile};
//! use sbprofile::transform::Shear;
//!
//! let psf: Profile = Gaussian::with_fwhm(0.7, 1.0).unwrap().into();
//! let gal = psf.shear(&Shear::new(0.2, 0.0).unwrap()).unwrap();
//! assert!((gal.flux() - 1.0).abs() < 1e-12);
//! assert!(gal.half_light_radius().is_err());
//! ```

pub mod airy;
pub mod convolve;
pub mod exponential;
pub mod gaussian;
pub(crate) mod hankel;
pub mod interpolant;
pub mod interpolated;
pub mod kolmogorov;
pub mod moffat;
pub mod pixel;
pub mod realspace;
pub mod sersic;
pub mod sum;
pub mod transformed;

pub use airy::Airy;
pub use convolve::Convolution;
pub use exponential::Exponential;
pub use gaussian::Gaussian;
pub use interpolant::Interpolant;
pub use interpolated::InterpolatedImage;
pub use kolmogorov::Kolmogorov;
pub use moffat::Moffat;
pub use pixel::BoxProfile;
pub use realspace::Support;
pub use sersic::Sersic;
pub use sum::Sum;
pub use transformed::Transformed;

use std::cell::Cell;
use std::collections::HashMap;
use std::fmt;
use std::ops::{Add, AddAssign, Mul, MulAssign};
use std::sync::{Arc, Mutex};

use nalgebra::Vector2;
use once_cell::sync::Lazy;
use profile_math::{bisect, bracket_upward, ConvergenceError};
use rustfft::num_complex::Complex64;

use crate::error::{require_finite, ProfileError, Result};
use crate::params::GsParams;
use crate::photon::PhotonArray;
use crate::random::BaseDeviate;
use crate::transform::{AffineTransform, Distortion, Shear};

/// Evaluation interface shared by every node of a profile tree.
pub trait SurfaceBrightness: fmt::Debug + Send + Sync {
    /// Short name used in error messages.
    fn kind(&self) -> &'static str;

    /// Surface brightness (flux per unit area) at `pos`.
    fn x_value(&self, pos: &Vector2<f64>) -> f64;

    /// Fourier amplitude at wave vector `k`.
    fn k_value(&self, k: &Vector2<f64>) -> Complex64;

    fn flux(&self) -> f64;

    /// Largest Fourier grid spacing that keeps folding below threshold.
    fn step_k(&self) -> f64;

    /// Wave number beyond which Fourier power is negligible.
    fn max_k(&self) -> f64;

    fn centroid(&self) -> Vector2<f64> {
        Vector2::zeros()
    }

    fn is_axisymmetric(&self) -> bool;

    fn has_hard_edges(&self) -> bool;

    /// Whether `x_value` is cheap and exact (no numerical transform).
    fn is_analytic_x(&self) -> bool {
        true
    }

    fn is_analytic_k(&self) -> bool {
        true
    }

    /// Upper bound on `|x_value|`.
    fn max_sb(&self) -> f64;

    /// Region outside which `x_value` is exactly zero.
    fn support(&self) -> Support {
        Support::Unbounded
    }

    /// Draw `n` photons whose fluxes sum to `flux()` in expectation.
    fn shoot(&self, n: usize, rng: &mut BaseDeviate) -> Result<PhotonArray>;

    fn gsparams(&self) -> &GsParams;
}

/// Immutable profile tree.
#[derive(Debug, Clone)]
pub enum Profile {
    Gaussian(Arc<Gaussian>),
    Exponential(Arc<Exponential>),
    Sersic(Arc<Sersic>),
    Moffat(Arc<Moffat>),
    Airy(Arc<Airy>),
    Kolmogorov(Arc<Kolmogorov>),
    Box(Arc<BoxProfile>),
    Interpolated(Arc<InterpolatedImage>),
    Sum(Arc<Sum>),
    Convolution(Arc<Convolution>),
    Transformed(Arc<Transformed>),
}

macro_rules! impl_from_node {
    ($($ty:ident => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Profile {
                fn from(node: $ty) -> Self {
                    Profile::$variant(Arc::new(node))
                }
            }
        )*
    };
}

impl_from_node!(
    Gaussian => Gaussian,
    Exponential => Exponential,
    Sersic => Sersic,
    Moffat => Moffat,
    Airy => Airy,
    Kolmogorov => Kolmogorov,
    BoxProfile => Box,
    InterpolatedImage => Interpolated,
    Sum => Sum,
    Convolution => Convolution,
    Transformed => Transformed,
);

impl Profile {
    /// The node as a trait object.
    pub fn as_sb(&self) -> &dyn SurfaceBrightness {
        match self {
            Profile::Gaussian(p) => p.as_ref(),
            Profile::Exponential(p) => p.as_ref(),
            Profile::Sersic(p) => p.as_ref(),
            Profile::Moffat(p) => p.as_ref(),
            Profile::Airy(p) => p.as_ref(),
            Profile::Kolmogorov(p) => p.as_ref(),
            Profile::Box(p) => p.as_ref(),
            Profile::Interpolated(p) => p.as_ref(),
            Profile::Sum(p) => p.as_ref(),
            Profile::Convolution(p) => p.as_ref(),
            Profile::Transformed(p) => p.as_ref(),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.as_sb().kind()
    }

    pub fn is_atomic(&self) -> bool {
        !matches!(self, Profile::Sum(_) | Profile::Convolution(_) | Profile::Transformed(_))
    }

    /// Surface brightness at `(x, y)`.
    pub fn x_value(&self, x: f64, y: f64) -> Result<f64> {
        if !(x.is_finite() && y.is_finite()) {
            return Err(ProfileError::OutOfDomain(format!("position ({x}, {y}) is not finite")));
        }
        Ok(self.xval(&Vector2::new(x, y)))
    }

    /// Fourier amplitude at `(kx, ky)`.
    pub fn k_value(&self, kx: f64, ky: f64) -> Result<Complex64> {
        if !(kx.is_finite() && ky.is_finite()) {
            return Err(ProfileError::OutOfDomain(format!("wave vector ({kx}, {ky}) is not finite")));
        }
        Ok(self.kval(&Vector2::new(kx, ky)))
    }

    /// Unchecked [`Profile::x_value`] for inner loops.
    pub fn xval(&self, pos: &Vector2<f64>) -> f64 {
        self.as_sb().x_value(pos)
    }

    /// Unchecked [`Profile::k_value`] for inner loops.
    pub fn kval(&self, k: &Vector2<f64>) -> Complex64 {
        self.as_sb().k_value(k)
    }

    pub fn flux(&self) -> f64 {
        self.as_sb().flux()
    }

    pub fn step_k(&self) -> f64 {
        self.as_sb().step_k()
    }

    pub fn max_k(&self) -> f64 {
        self.as_sb().max_k()
    }

    pub fn centroid(&self) -> Vector2<f64> {
        self.as_sb().centroid()
    }

    pub fn is_axisymmetric(&self) -> bool {
        self.as_sb().is_axisymmetric()
    }

    pub fn has_hard_edges(&self) -> bool {
        self.as_sb().has_hard_edges()
    }

    pub fn is_analytic_x(&self) -> bool {
        self.as_sb().is_analytic_x()
    }

    pub fn is_analytic_k(&self) -> bool {
        self.as_sb().is_analytic_k()
    }

    pub fn max_sb(&self) -> f64 {
        self.as_sb().max_sb()
    }

    pub fn support(&self) -> Support {
        self.as_sb().support()
    }

    pub fn gsparams(&self) -> &GsParams {
        self.as_sb().gsparams()
    }

    pub fn shoot(&self, n: usize, rng: &mut BaseDeviate) -> Result<PhotonArray> {
        self.as_sb().shoot(n, rng)
    }

    /// True if a [`BoxProfile`] appears anywhere in the tree.
    pub fn contains_box(&self) -> bool {
        match self {
            Profile::Box(_) => true,
            Profile::Sum(s) => s.items().iter().any(Profile::contains_box),
            Profile::Convolution(c) => c.items().iter().any(Profile::contains_box),
            Profile::Transformed(t) => t.child().contains_box(),
            _ => false,
        }
    }

    /// Same shape with total flux `flux`.
    ///
    /// Atomic profiles stay atomic; composites are wrapped in (or merged
    /// into) a flux-scaling transform, which needs a non-zero current flux.
    pub fn with_flux(&self, flux: f64) -> Result<Profile> {
        require_finite("flux", flux)?;
        let profile = match self {
            Profile::Gaussian(p) => p.with_flux(flux)?.into(),
            Profile::Exponential(p) => p.with_flux(flux)?.into(),
            Profile::Sersic(p) => p.with_flux(flux)?.into(),
            Profile::Moffat(p) => p.with_flux(flux)?.into(),
            Profile::Airy(p) => p.with_flux(flux)?.into(),
            Profile::Kolmogorov(p) => p.with_flux(flux)?.into(),
            Profile::Box(p) => p.with_flux(flux)?.into(),
            Profile::Interpolated(p) => p.with_flux(flux)?.into(),
            Profile::Sum(_) | Profile::Convolution(_) | Profile::Transformed(_) => {
                let current = self.flux();
                if current == 0.0 {
                    return Err(ProfileError::invalid("flux", "cannot rescale a composite with zero flux"));
                }
                self.transform(&AffineTransform::flux_scaling(flux / current)?)?
            }
        };
        Ok(profile)
    }

    /// Multiply the flux by `ratio`.
    pub fn scale_flux(&self, ratio: f64) -> Result<Profile> {
        require_finite("ratio", ratio)?;
        if self.is_atomic() {
            self.with_flux(self.flux() * ratio)
        } else {
            self.transform(&AffineTransform::flux_scaling(ratio)?)
        }
    }

    /// Apply an affine map. Successive maps merge into a single node.
    pub fn transform(&self, t: &AffineTransform) -> Result<Profile> {
        if t.is_identity() {
            return Ok(self.clone());
        }
        if t.is_flux_only() && self.is_atomic() {
            return self.with_flux(self.flux() * t.flux_ratio);
        }
        match self {
            Profile::Transformed(inner) => {
                let combined = inner.transform().then(t);
                if combined.is_identity() {
                    Ok(inner.child().clone())
                } else {
                    Ok(Transformed::new(inner.child().clone(), combined)?.into())
                }
            }
            _ => Ok(Transformed::new(self.clone(), *t)?.into()),
        }
    }

    pub fn shear(&self, shear: &Shear) -> Result<Profile> {
        self.transform(&AffineTransform::shear(shear))
    }

    /// Rotate counter-clockwise by `theta` radians.
    pub fn rotate(&self, theta: f64) -> Result<Profile> {
        self.transform(&AffineTransform::rotation(theta)?)
    }

    /// Scale linear size by `scale`, keeping the flux.
    pub fn dilate(&self, scale: f64) -> Result<Profile> {
        self.transform(&AffineTransform::dilation(scale)?)
    }

    /// Lensing magnification: area and flux both grow by `mu`.
    pub fn magnify(&self, mu: f64) -> Result<Profile> {
        self.transform(&AffineTransform::magnification(mu)?)
    }

    pub fn shift(&self, dx: f64, dy: f64) -> Result<Profile> {
        self.transform(&AffineTransform::shift(dx, dy)?)
    }

    /// Ellipticity, rotation, shear, shift and magnification in that order.
    pub fn distort(&self, distortion: &Distortion) -> Result<Profile> {
        self.transform(&distortion.to_transform()?)
    }

    pub fn half_light_radius(&self) -> Result<f64> {
        match self {
            Profile::Gaussian(p) => Ok(p.half_light_radius()),
            Profile::Exponential(p) => Ok(p.half_light_radius()),
            Profile::Sersic(p) => Ok(p.half_light_radius()),
            Profile::Moffat(p) => Ok(p.half_light_radius()),
            Profile::Airy(p) => Ok(p.half_light_radius()),
            Profile::Kolmogorov(p) => Ok(p.half_light_radius()),
            _ => Err(ProfileError::undefined("half_light_radius", self.kind())),
        }
    }

    pub fn fwhm(&self) -> Result<f64> {
        match self {
            Profile::Gaussian(p) => Ok(p.fwhm()),
            Profile::Moffat(p) => Ok(p.fwhm()),
            Profile::Airy(p) => Ok(p.fwhm()),
            Profile::Kolmogorov(p) => Ok(p.fwhm()),
            _ => Err(ProfileError::undefined("fwhm", self.kind())),
        }
    }

    pub fn sigma(&self) -> Result<f64> {
        match self {
            Profile::Gaussian(p) => Ok(p.sigma()),
            _ => Err(ProfileError::undefined("sigma", self.kind())),
        }
    }

    pub fn scale_radius(&self) -> Result<f64> {
        match self {
            Profile::Exponential(p) => Ok(p.scale_radius()),
            Profile::Sersic(p) => Ok(p.scale_radius()),
            Profile::Moffat(p) => Ok(p.scale_radius()),
            _ => Err(ProfileError::undefined("scale_radius", self.kind())),
        }
    }

    pub fn sersic_index(&self) -> Result<f64> {
        match self {
            Profile::Sersic(p) => Ok(p.n()),
            _ => Err(ProfileError::undefined("n", self.kind())),
        }
    }

    pub fn beta(&self) -> Result<f64> {
        match self {
            Profile::Moffat(p) => Ok(p.beta()),
            _ => Err(ProfileError::undefined("beta", self.kind())),
        }
    }

    pub fn trunc(&self) -> Result<f64> {
        match self {
            Profile::Moffat(p) => Ok(p.trunc()),
            _ => Err(ProfileError::undefined("trunc", self.kind())),
        }
    }

    pub fn lam_over_d(&self) -> Result<f64> {
        match self {
            Profile::Airy(p) => Ok(p.lam_over_d()),
            _ => Err(ProfileError::undefined("lam_over_d", self.kind())),
        }
    }

    pub fn obscuration(&self) -> Result<f64> {
        match self {
            Profile::Airy(p) => Ok(p.obscuration()),
            _ => Err(ProfileError::undefined("obscuration", self.kind())),
        }
    }

    pub fn lam_over_r0(&self) -> Result<f64> {
        match self {
            Profile::Kolmogorov(p) => Ok(p.lam_over_r0()),
            _ => Err(ProfileError::undefined("lam_over_r0", self.kind())),
        }
    }

    /// Box (or pixel) width.
    pub fn width(&self) -> Result<f64> {
        match self {
            Profile::Box(p) => Ok(p.width()),
            _ => Err(ProfileError::undefined("width", self.kind())),
        }
    }

    pub fn height(&self) -> Result<f64> {
        match self {
            Profile::Box(p) => Ok(p.height()),
            _ => Err(ProfileError::undefined("height", self.kind())),
        }
    }
}

impl Add for Profile {
    type Output = Profile;

    fn add(self, rhs: Profile) -> Profile {
        Sum::from_pair(self, rhs).into()
    }
}

impl Add for &Profile {
    type Output = Profile;

    fn add(self, rhs: &Profile) -> Profile {
        Sum::from_pair(self.clone(), rhs.clone()).into()
    }
}

impl AddAssign for Profile {
    fn add_assign(&mut self, rhs: Profile) {
        *self = Sum::from_pair(self.clone(), rhs).into();
    }
}

/// Flux scaling. A non-finite factor propagates into the flux.
impl Mul<f64> for Profile {
    type Output = Profile;

    fn mul(self, rhs: f64) -> Profile {
        scale_unchecked(&self, rhs)
    }
}

impl Mul<f64> for &Profile {
    type Output = Profile;

    fn mul(self, rhs: f64) -> Profile {
        scale_unchecked(self, rhs)
    }
}

impl Mul<Profile> for f64 {
    type Output = Profile;

    fn mul(self, rhs: Profile) -> Profile {
        scale_unchecked(&rhs, self)
    }
}

impl MulAssign<f64> for Profile {
    fn mul_assign(&mut self, rhs: f64) {
        *self = scale_unchecked(self, rhs);
    }
}

fn scale_unchecked(profile: &Profile, ratio: f64) -> Profile {
    match profile.scale_flux(ratio) {
        Ok(p) => p,
        Err(_) => Transformed::flux_scaled(profile.clone(), ratio).into(),
    }
}

/// Shared, lazily filled per-shape data, keyed by shape parameters and
/// the accuracy settings that shaped its tables.
pub(crate) type InfoCache<V> = Lazy<Mutex<HashMap<Vec<u64>, Arc<V>>>>;

const MAX_CACHED_SHAPES: usize = 100;

pub(crate) fn cached_info<V, F>(cache: &InfoCache<V>, key: Vec<u64>, build: F) -> Result<Arc<V>>
where
    F: FnOnce() -> Result<V>,
{
    if let Some(hit) = cache.lock().ok().and_then(|map| map.get(&key).cloned()) {
        return Ok(hit);
    }
    let info = Arc::new(build()?);
    if let Ok(mut map) = cache.lock() {
        if map.len() >= MAX_CACHED_SHAPES {
            map.clear();
        }
        map.insert(key, Arc::clone(&info));
    }
    Ok(info)
}

/// Root of a monotone function whose evaluation can itself fail. The
/// bracket `[lo, hi]` is grown upward until the sign changes.
pub(crate) fn find_root(what: &'static str, f: impl Fn(f64) -> std::result::Result<f64, ConvergenceError>, lo: f64, hi: f64) -> Result<f64> {
    let failure: Cell<Option<ConvergenceError>> = Cell::new(None);
    let g = |x: f64| match f(x) {
        Ok(v) => v,
        Err(e) => {
            failure.set(Some(e));
            f64::NAN
        }
    };
    let (lo, hi) = bracket_upward(&g, lo, hi, 60).map_err(|e| ProfileError::numerical(what, e))?;
    let root = bisect(&g, lo, hi, 1e-12, 300).map_err(|e| ProfileError::numerical(what, e))?;
    match failure.take() {
        Some(e) => Err(ProfileError::numerical(what, e)),
        None => Ok(root),
    }
}

/// Photons of an axisymmetric profile given a radius sampler in unit radius.
pub(crate) fn shoot_radial(
    n: usize,
    flux: f64,
    scale: f64,
    rng: &mut BaseDeviate,
    mut radius: impl FnMut(&mut BaseDeviate) -> f64,
) -> PhotonArray {
    let mut photons = PhotonArray::new(n);
    let each = if n > 0 { flux / n as f64 } else { 0.0 };
    for i in 0..n {
        let r = scale * radius(rng);
        let theta = 2.0 * std::f64::consts::PI * rng.uniform();
        photons.set_photon(i, r * theta.cos(), r * theta.sin(), each);
    }
    photons
}
