//! Affine image of another profile.
//!
//! With `t = (J, o, ratio)` the node is
//! `x'(p) = ratio * f(J⁻¹ (p - o)) / |det J|`, which conserves flux apart
//! from `ratio`. In Fourier space `k'(k) = ratio * f(Jᵀ k) exp(-i k·o)`.

use std::f64::consts::PI;

use nalgebra::{Matrix2, Vector2};
use profile_math::{invert_matrix, singular_values};
use rustfft::num_complex::Complex64;

use super::{Profile, Support, SurfaceBrightness};
use crate::error::Result;
use crate::params::GsParams;
use crate::photon::PhotonArray;
use crate::random::BaseDeviate;
use crate::transform::AffineTransform;

#[derive(Debug, Clone)]
pub struct Transformed {
    child: Profile,
    transform: AffineTransform,
    inverse: Matrix2<f64>,
    abs_det: f64,
    /// Semi-axes of the image of the unit circle, `(major, minor)`.
    axes: (f64, f64),
}

impl Transformed {
    pub fn new(child: Profile, transform: AffineTransform) -> Result<Self> {
        let inverse = invert_matrix(&transform.jacobian)?;
        Ok(Self {
            child,
            inverse,
            abs_det: transform.determinant().abs(),
            axes: singular_values(&transform.jacobian),
            transform,
        })
    }

    /// Pure flux scaling; also accepts a non-finite ratio.
    pub(crate) fn flux_scaled(child: Profile, ratio: f64) -> Self {
        Self {
            child,
            transform: AffineTransform {
                flux_ratio: ratio,
                ..AffineTransform::identity()
            },
            inverse: Matrix2::identity(),
            abs_det: 1.0,
            axes: (1.0, 1.0),
        }
    }

    pub fn child(&self) -> &Profile {
        &self.child
    }

    pub fn transform(&self) -> &AffineTransform {
        &self.transform
    }

    fn to_child_frame(&self, pos: &Vector2<f64>) -> Vector2<f64> {
        self.inverse * (pos - self.transform.offset)
    }
}

impl SurfaceBrightness for Transformed {
    fn kind(&self) -> &'static str {
        "Transformed"
    }

    fn x_value(&self, pos: &Vector2<f64>) -> f64 {
        let inner = self.child.xval(&self.to_child_frame(pos));
        self.transform.flux_ratio * inner / self.abs_det
    }

    fn k_value(&self, k: &Vector2<f64>) -> Complex64 {
        let kc = self.transform.jacobian.transpose() * k;
        let phase = -k.dot(&self.transform.offset);
        self.child.kval(&kc) * Complex64::from_polar(self.transform.flux_ratio, phase)
    }

    fn flux(&self) -> f64 {
        self.transform.flux_ratio * self.child.flux()
    }

    /// The child's folding radius stretches by the major axis, and a shift
    /// moves flux that much further from the origin.
    fn step_k(&self) -> f64 {
        let r = PI / self.child.step_k() * self.axes.0 + self.transform.offset.norm();
        PI / r
    }

    fn max_k(&self) -> f64 {
        self.child.max_k() / self.axes.1
    }

    fn centroid(&self) -> Vector2<f64> {
        self.transform.apply(&self.child.centroid())
    }

    /// Only rotations and isotropic scalings about the origin keep symmetry.
    fn is_axisymmetric(&self) -> bool {
        let (major, minor) = self.axes;
        self.child.is_axisymmetric()
            && self.transform.offset == Vector2::zeros()
            && (major - minor).abs() <= 1e-12 * major
    }

    fn has_hard_edges(&self) -> bool {
        self.child.has_hard_edges()
    }

    fn is_analytic_x(&self) -> bool {
        self.child.is_analytic_x()
    }

    fn is_analytic_k(&self) -> bool {
        self.child.is_analytic_k()
    }

    fn max_sb(&self) -> f64 {
        (self.transform.flux_ratio * self.child.max_sb() / self.abs_det).abs()
    }

    fn support(&self) -> Support {
        self.child.support().transform(&self.transform.jacobian, &self.transform.offset)
    }

    fn shoot(&self, n: usize, rng: &mut BaseDeviate) -> Result<PhotonArray> {
        let mut photons = self.child.shoot(n, rng)?;
        let t = self.transform;
        photons.map_positions(|x, y| {
            let p = t.apply(&Vector2::new(x, y));
            (p.x, p.y)
        });
        photons.scale_flux(t.flux_ratio);
        Ok(photons)
    }

    fn gsparams(&self) -> &GsParams {
        self.child.gsparams()
    }
}
