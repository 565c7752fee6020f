//! Real-space convolution of two profiles by direct 2-D quadrature.
//!
//! `(f ⊗ g)(p) = ∫ f(q) g(p - q) d²q`, integrated over the intersection of
//! the two supports so that hard edges fall on the integration limits
//! rather than inside a quadrature panel.

use nalgebra::{Matrix2, Vector2};
use profile_math::{integrate, invert_matrix};

use super::Profile;

/// Region outside which a profile is exactly zero. Bounded supports are
/// convex, so every vertical line crosses them in a single interval.
#[derive(Debug, Clone, PartialEq)]
pub enum Support {
    Unbounded,
    /// Convex polygon, vertices in order.
    Polygon(Vec<Vector2<f64>>),
    /// `{q : (q - center)ᵀ shape⁻¹ (q - center) <= 1}`
    Ellipse { center: Vector2<f64>, shape: Matrix2<f64> },
}

impl Support {
    pub fn disk(center: Vector2<f64>, radius: f64) -> Support {
        Support::Ellipse {
            center,
            shape: Matrix2::identity() * (radius * radius),
        }
    }

    /// Axis-aligned rectangle centred on the origin.
    pub fn rectangle(width: f64, height: f64) -> Support {
        let (w, h) = (0.5 * width, 0.5 * height);
        Support::Polygon(vec![
            Vector2::new(-w, -h),
            Vector2::new(w, -h),
            Vector2::new(w, h),
            Vector2::new(-w, h),
        ])
    }

    pub fn is_bounded(&self) -> bool {
        !matches!(self, Support::Unbounded)
    }

    /// Image of the region under `q -> jacobian q + offset`.
    pub fn transform(&self, jacobian: &Matrix2<f64>, offset: &Vector2<f64>) -> Support {
        match self {
            Support::Unbounded => Support::Unbounded,
            Support::Polygon(vertices) => Support::Polygon(vertices.iter().map(|v| jacobian * v + offset).collect()),
            Support::Ellipse { center, shape } => Support::Ellipse {
                center: jacobian * center + offset,
                shape: jacobian * shape * jacobian.transpose(),
            },
        }
    }

    pub fn contains(&self, q: &Vector2<f64>) -> bool {
        match self.y_range_at(q.x) {
            Some((lo, hi)) => q.y >= lo && q.y <= hi,
            None => !self.is_bounded(),
        }
    }

    pub fn x_range(&self) -> Option<(f64, f64)> {
        match self {
            Support::Unbounded => None,
            Support::Polygon(vertices) => {
                let lo = vertices.iter().map(|v| v.x).fold(f64::INFINITY, f64::min);
                let hi = vertices.iter().map(|v| v.x).fold(f64::NEG_INFINITY, f64::max);
                Some((lo, hi))
            }
            Support::Ellipse { center, shape } => {
                let half = shape[(0, 0)].sqrt();
                Some((center.x - half, center.x + half))
            }
        }
    }

    /// Vertical extent of the region at abscissa `x`, or `None` when the
    /// line misses it (always `None` for an unbounded region).
    pub fn y_range_at(&self, x: f64) -> Option<(f64, f64)> {
        match self {
            Support::Unbounded => None,
            Support::Polygon(vertices) => {
                let mut lo = f64::INFINITY;
                let mut hi = f64::NEG_INFINITY;
                let n = vertices.len();
                for i in 0..n {
                    let a = vertices[i];
                    let b = vertices[(i + 1) % n];
                    let (x0, x1) = (a.x.min(b.x), a.x.max(b.x));
                    if x < x0 || x > x1 {
                        continue;
                    }
                    if x1 == x0 {
                        lo = lo.min(a.y.min(b.y));
                        hi = hi.max(a.y.max(b.y));
                    } else {
                        let y = a.y + (b.y - a.y) * (x - a.x) / (b.x - a.x);
                        lo = lo.min(y);
                        hi = hi.max(y);
                    }
                }
                (lo <= hi).then_some((lo, hi))
            }
            Support::Ellipse { center, shape } => {
                let m = invert_matrix(shape).ok()?;
                let dx = x - center.x;
                // m11 dx² + 2 m12 dx dy + m22 dy² = 1
                let a = m[(1, 1)];
                let b = m[(0, 1)] * dx;
                let c = m[(0, 0)] * dx * dx - 1.0;
                let disc = b * b - a * c;
                if disc < 0.0 {
                    return None;
                }
                let root = disc.sqrt();
                Some((center.y + (-b - root) / a, center.y + (-b + root) / a))
            }
        }
    }
}

/// Support used for integration: unbounded profiles are cut at the radius
/// their Fourier sampling already assumes they fit inside.
fn effective_support(profile: &Profile) -> Support {
    match profile.support() {
        Support::Unbounded => Support::disk(profile.centroid(), std::f64::consts::PI / profile.step_k()),
        bounded => bounded,
    }
}

fn intersect(a: Option<(f64, f64)>, b: Option<(f64, f64)>) -> Option<(f64, f64)> {
    let (a0, a1) = a?;
    let (b0, b1) = b?;
    let lo = a0.max(b0);
    let hi = a1.min(b1);
    (lo < hi).then_some((lo, hi))
}

/// `∫ f(q) g(p - q) d²q` by nested adaptive quadrature.
pub(crate) fn convolve_at(f: &Profile, g: &Profile, p: &Vector2<f64>, rel_tol: f64, abs_tol: f64) -> f64 {
    let s1 = effective_support(f);
    // q ranges over p - supp(g)
    let s2 = effective_support(g).transform(&(-Matrix2::identity()), p);
    let Some((x_lo, x_hi)) = intersect(s1.x_range(), s2.x_range()) else {
        return 0.0;
    };
    let inner = |x: f64| -> f64 {
        match intersect(s1.y_range_at(x), s2.y_range_at(x)) {
            Some((y_lo, y_hi)) => {
                integrate(
                    |y| {
                        let q = Vector2::new(x, y);
                        f.xval(&q) * g.xval(&(p - q))
                    },
                    y_lo,
                    y_hi,
                    rel_tol,
                    abs_tol,
                )
                .value
            }
            None => 0.0,
        }
    };
    integrate(inner, x_lo, x_hi, rel_tol, abs_tol).value
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_polygon_ranges() {
        let square = Support::rectangle(2.0, 1.0);
        assert_eq!(square.x_range(), Some((-1.0, 1.0)));
        assert_eq!(square.y_range_at(0.3), Some((-0.5, 0.5)));
        assert_eq!(square.y_range_at(1.5), None);
        assert!(square.contains(&Vector2::new(0.9, -0.4)));
        assert!(!square.contains(&Vector2::new(0.9, 0.6)));
    }

    #[test]
    fn test_rotated_square_is_diamond() {
        let r = profile_math::rotation_matrix(std::f64::consts::FRAC_PI_4);
        let diamond = Support::rectangle(2.0, 2.0).transform(&r, &Vector2::zeros());
        let half = std::f64::consts::SQRT_2;
        let (lo, hi) = diamond.x_range().unwrap();
        assert_relative_eq!(lo, -half, epsilon = 1e-12);
        assert_relative_eq!(hi, half, epsilon = 1e-12);
        let (y0, y1) = diamond.y_range_at(0.5).unwrap();
        assert_relative_eq!(y1 - y0, 2.0 * (half - 0.5), epsilon = 1e-12);
    }

    #[test]
    fn test_ellipse_ranges() {
        let disk = Support::disk(Vector2::new(1.0, 2.0), 2.0);
        assert_eq!(disk.x_range(), Some((-1.0, 3.0)));
        let (lo, hi) = disk.y_range_at(1.0).unwrap();
        assert_relative_eq!(lo, 0.0, epsilon = 1e-12);
        assert_relative_eq!(hi, 4.0, epsilon = 1e-12);
        let stretched = disk.transform(&Matrix2::new(2.0, 0.0, 0.0, 1.0), &Vector2::zeros());
        assert_eq!(stretched.x_range(), Some((-2.0, 6.0)));
        assert!(!Support::Unbounded.is_bounded());
    }
}
