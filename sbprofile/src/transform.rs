//! Affine maps of the image plane.
//!
//! A transform sends a profile's own coordinates `x` to `J x + offset` and
//! multiplies its flux by `flux_ratio`. The jacobian part alone conserves
//! flux: surface brightness scales by `1/|det J|` while the Fourier value
//! at the origin is unchanged.

use nalgebra::{Matrix2, Vector2};
use profile_math::{invert_matrix, rotation_matrix, scale_matrix, shear_matrix};

use crate::error::{require_finite, require_positive, ProfileError, Result};

/// Reduced shear `g = (a - b) / (a + b)` with position angle `beta`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shear {
    g1: f64,
    g2: f64,
}

impl Shear {
    pub fn new(g1: f64, g2: f64) -> Result<Self> {
        require_finite("g1", g1)?;
        require_finite("g2", g2)?;
        if g1 * g1 + g2 * g2 >= 1.0 {
            return Err(ProfileError::invalid("g", format!("|g| must be < 1, got ({g1}, {g2})")));
        }
        Ok(Self { g1, g2 })
    }

    /// From distortion `e = (a² - b²) / (a² + b²)`, using `g = tanh(atanh(e) / 2)`.
    pub fn from_distortion(e1: f64, e2: f64) -> Result<Self> {
        let e = (e1 * e1 + e2 * e2).sqrt();
        if !(e < 1.0) {
            return Err(ProfileError::invalid("e", format!("|e| must be < 1, got {e}")));
        }
        if e == 0.0 {
            return Ok(Self { g1: 0.0, g2: 0.0 });
        }
        let g = (0.5 * e.atanh()).tanh();
        Self::new(e1 * g / e, e2 * g / e)
    }

    /// From magnitude `|g|` and position angle `beta` (radians).
    pub fn from_polar(g: f64, beta: f64) -> Result<Self> {
        Self::new(g * (2.0 * beta).cos(), g * (2.0 * beta).sin())
    }

    pub fn g1(&self) -> f64 {
        self.g1
    }

    pub fn g2(&self) -> f64 {
        self.g2
    }

    pub fn g(&self) -> f64 {
        self.g1.hypot(self.g2)
    }

    /// Position angle in radians, in `(-π/2, π/2]`.
    pub fn beta(&self) -> f64 {
        0.5 * self.g2.atan2(self.g1)
    }

    /// Distortion magnitude `|e| = 2g / (1 + g²)`.
    pub fn e(&self) -> f64 {
        let g = self.g();
        2.0 * g / (1.0 + g * g)
    }

    pub fn inverse(&self) -> Shear {
        Shear {
            g1: -self.g1,
            g2: -self.g2,
        }
    }

    /// Area-preserving jacobian of this shear.
    pub fn matrix(&self) -> Matrix2<f64> {
        // |g| < 1 is enforced at construction
        shear_matrix(self.g1, self.g2).unwrap_or_else(|_| Matrix2::identity())
    }
}

/// `x -> jacobian * x + offset`, with flux multiplied by `flux_ratio`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineTransform {
    pub jacobian: Matrix2<f64>,
    pub offset: Vector2<f64>,
    pub flux_ratio: f64,
}

impl Default for AffineTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl AffineTransform {
    pub fn identity() -> Self {
        Self {
            jacobian: Matrix2::identity(),
            offset: Vector2::zeros(),
            flux_ratio: 1.0,
        }
    }

    /// General map; the jacobian must be invertible.
    pub fn new(jacobian: Matrix2<f64>, offset: Vector2<f64>, flux_ratio: f64) -> Result<Self> {
        invert_matrix(&jacobian)?;
        require_finite("offset.x", offset.x)?;
        require_finite("offset.y", offset.y)?;
        require_finite("flux_ratio", flux_ratio)?;
        Ok(Self {
            jacobian,
            offset,
            flux_ratio,
        })
    }

    /// Linear scaling by `scale` at fixed flux.
    pub fn dilation(scale: f64) -> Result<Self> {
        require_positive("scale", scale)?;
        Ok(Self {
            jacobian: scale_matrix(scale, scale),
            ..Self::identity()
        })
    }

    /// Lensing magnification: area scales by `mu`, and so does flux.
    pub fn magnification(mu: f64) -> Result<Self> {
        require_positive("mu", mu)?;
        let s = mu.sqrt();
        Ok(Self {
            jacobian: scale_matrix(s, s),
            offset: Vector2::zeros(),
            flux_ratio: mu,
        })
    }

    /// Counter-clockwise rotation by `theta` radians.
    pub fn rotation(theta: f64) -> Result<Self> {
        require_finite("theta", theta)?;
        Ok(Self {
            jacobian: rotation_matrix(theta),
            ..Self::identity()
        })
    }

    pub fn shear(shear: &Shear) -> Self {
        Self {
            jacobian: shear.matrix(),
            ..Self::identity()
        }
    }

    pub fn shift(dx: f64, dy: f64) -> Result<Self> {
        require_finite("dx", dx)?;
        require_finite("dy", dy)?;
        Ok(Self {
            offset: Vector2::new(dx, dy),
            ..Self::identity()
        })
    }

    pub fn flux_scaling(ratio: f64) -> Result<Self> {
        require_finite("flux_ratio", ratio)?;
        Ok(Self {
            flux_ratio: ratio,
            ..Self::identity()
        })
    }

    /// Apply `self` first, then `outer`.
    pub fn then(&self, outer: &AffineTransform) -> AffineTransform {
        AffineTransform {
            jacobian: outer.jacobian * self.jacobian,
            offset: outer.jacobian * self.offset + outer.offset,
            flux_ratio: self.flux_ratio * outer.flux_ratio,
        }
    }

    pub fn inverse(&self) -> Result<AffineTransform> {
        let inv = invert_matrix(&self.jacobian)?;
        if self.flux_ratio == 0.0 {
            return Err(ProfileError::invalid("flux_ratio", "a zero flux ratio has no inverse"));
        }
        Ok(AffineTransform {
            jacobian: inv,
            offset: -(inv * self.offset),
            flux_ratio: 1.0 / self.flux_ratio,
        })
    }

    /// Map a point in the profile's own frame to the transformed frame.
    pub fn apply(&self, p: &Vector2<f64>) -> Vector2<f64> {
        self.jacobian * p + self.offset
    }

    pub fn determinant(&self) -> f64 {
        self.jacobian.determinant()
    }

    pub fn is_identity(&self) -> bool {
        self.jacobian == Matrix2::identity() && self.offset == Vector2::zeros() && self.flux_ratio == 1.0
    }

    /// True when only the flux changes.
    pub fn is_flux_only(&self) -> bool {
        self.jacobian == Matrix2::identity() && self.offset == Vector2::zeros()
    }
}

/// Combined distortion applied in the fixed order
/// ellipticity, rotation, shear, shift, magnification.
///
/// Magnification acts last, so it also scales the shift.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Distortion {
    /// Intrinsic ellipticity of the source
    pub ellipticity: Option<Shear>,
    /// Rotation in radians, counter-clockwise
    pub rotation: f64,
    /// Applied (lensing) shear
    pub shear: Option<Shear>,
    pub shift: Vector2<f64>,
    pub magnification: f64,
}

impl Default for Distortion {
    fn default() -> Self {
        Self {
            ellipticity: None,
            rotation: 0.0,
            shear: None,
            shift: Vector2::zeros(),
            magnification: 1.0,
        }
    }
}

impl Distortion {
    pub fn to_transform(&self) -> Result<AffineTransform> {
        let mut total = AffineTransform::identity();
        if let Some(e) = &self.ellipticity {
            total = total.then(&AffineTransform::shear(e));
        }
        if self.rotation != 0.0 {
            total = total.then(&AffineTransform::rotation(self.rotation)?);
        }
        if let Some(g) = &self.shear {
            total = total.then(&AffineTransform::shear(g));
        }
        total = total.then(&AffineTransform::shift(self.shift.x, self.shift.y)?);
        if self.magnification != 1.0 {
            total = total.then(&AffineTransform::magnification(self.magnification)?);
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_shear_from_distortion() {
        let s = Shear::from_distortion(0.02, 0.0).unwrap();
        let expected = (0.5 * 0.02_f64.atanh()).tanh();
        assert_relative_eq!(s.g1(), expected, epsilon = 1e-15);
        assert_relative_eq!(s.e(), 0.02, epsilon = 1e-14);
    }

    #[test]
    fn test_shear_polar_round_trip() {
        let s = Shear::from_polar(0.3, 0.4).unwrap();
        assert_relative_eq!(s.g(), 0.3, epsilon = 1e-14);
        assert_relative_eq!(s.beta(), 0.4, epsilon = 1e-14);
    }

    #[test]
    fn test_shear_rejects_unphysical() {
        assert!(Shear::new(0.9, 0.5).is_err());
        assert!(Shear::from_distortion(1.0, 0.0).is_err());
    }

    #[test]
    fn test_then_composes_in_order() {
        let rot = AffineTransform::rotation(FRAC_PI_2).unwrap();
        let shift = AffineTransform::shift(1.0, 0.0).unwrap();
        let p = Vector2::new(1.0, 0.0);

        // rotate then shift: (1,0) -> (0,1) -> (1,1)
        let a = rot.then(&shift).apply(&p);
        assert_relative_eq!(a, Vector2::new(1.0, 1.0), epsilon = 1e-14);

        // shift then rotate: (1,0) -> (2,0) -> (0,2)
        let b = shift.then(&rot).apply(&p);
        assert_relative_eq!(b, Vector2::new(0.0, 2.0), epsilon = 1e-14);
    }

    #[test]
    fn test_inverse_round_trip() {
        let t = AffineTransform::new(Matrix2::new(1.2, 0.3, -0.1, 0.8), Vector2::new(0.5, -2.0), 3.0).unwrap();
        let round = t.then(&t.inverse().unwrap());
        assert_relative_eq!(round.jacobian, Matrix2::identity(), epsilon = 1e-14);
        assert_relative_eq!(round.offset, Vector2::zeros(), epsilon = 1e-14);
        assert_relative_eq!(round.flux_ratio, 1.0, epsilon = 1e-15);
    }

    #[test]
    fn test_singular_jacobian_rejected() {
        let err = AffineTransform::new(Matrix2::new(1.0, 2.0, 0.5, 1.0), Vector2::zeros(), 1.0).unwrap_err();
        assert!(matches!(err, ProfileError::SingularTransform(_)));
    }

    #[test]
    fn test_magnification_scales_flux_and_area() {
        let m = AffineTransform::magnification(1.44).unwrap();
        assert_relative_eq!(m.determinant(), 1.44, epsilon = 1e-14);
        assert_relative_eq!(m.flux_ratio, 1.44, epsilon = 1e-14);
    }

    #[test]
    fn test_distortion_order() {
        let e = Shear::new(0.2, 0.0).unwrap();
        let g = Shear::new(0.0, 0.1).unwrap();
        let d = Distortion {
            ellipticity: Some(e),
            rotation: 0.3,
            shear: Some(g),
            shift: Vector2::new(0.5, -0.25),
            magnification: 1.21,
        };
        let t = d.to_transform().unwrap();

        let expected_jac = 1.1 * g.matrix() * rotation_matrix(0.3) * e.matrix();
        assert_relative_eq!(t.jacobian, expected_jac, epsilon = 1e-13);
        assert_relative_eq!(t.offset, Vector2::new(0.55, -0.275), epsilon = 1e-13);
        assert_relative_eq!(t.flux_ratio, 1.21, epsilon = 1e-14);
    }
}
