//! 2x2 matrix utilities using nalgebra
//!
//! Jacobian helpers for affine maps of the image plane: inversion with
//! singularity checks, rotations, dilations, area-preserving shears and the
//! singular values used to bound how far a map stretches a profile.

use nalgebra::Matrix2;
use thiserror::Error;

/// Error when matrix inversion fails due to singular matrix
#[derive(Error, Debug, Clone, PartialEq)]
#[error("singular matrix: determinant={determinant:.6e}")]
pub struct SingularMatrixError {
    /// The determinant value (zero or near-zero)
    pub determinant: f64,
}

/// Error when a reduced shear has magnitude at or beyond unity
#[derive(Error, Debug, Clone, PartialEq)]
#[error("shear magnitude |g|={magnitude:.6} must be < 1")]
pub struct ShearRangeError {
    pub magnitude: f64,
}

/// Determinants at or below this fraction of `‖M‖²` (Frobenius) count as
/// zero, so the test does not depend on the overall scale of the matrix.
const DETERMINANT_EPSILON: f64 = 1e-12;

/// Invert a 2x2 matrix with error handling for singular matrices
///
/// # Arguments
/// * `matrix` - The 2x2 matrix to invert
///
/// # Returns
/// * `Ok(Matrix2<f64>)` - The inverse matrix
/// * `Err(SingularMatrixError)` - If matrix is singular
pub fn invert_matrix(matrix: &Matrix2<f64>) -> Result<Matrix2<f64>, SingularMatrixError> {
    let det = matrix.determinant();

    if !det.is_finite() || det.abs() <= DETERMINANT_EPSILON * matrix.norm_squared() {
        return Err(SingularMatrixError { determinant: det });
    }

    matrix
        .try_inverse()
        .ok_or(SingularMatrixError { determinant: det })
}

/// Create a 2x2 rotation matrix
///
/// # Arguments
/// * `angle_rad` - Rotation angle in radians (counter-clockwise)
pub fn rotation_matrix(angle_rad: f64) -> Matrix2<f64> {
    let c = angle_rad.cos();
    let s = angle_rad.sin();
    Matrix2::new(c, -s, s, c)
}

/// Create a 2x2 scaling matrix
pub fn scale_matrix(sx: f64, sy: f64) -> Matrix2<f64> {
    Matrix2::new(sx, 0.0, 0.0, sy)
}

/// Area-preserving shear matrix for reduced shear (g1, g2).
///
/// ```text
///            1         | 1+g1   g2  |
/// S = --------------   |            |
///     sqrt(1 - |g|^2)  |  g2   1-g1 |
/// ```
///
/// `det(S) == 1`, and `S(-g)` is the exact inverse of `S(g)`.
pub fn shear_matrix(g1: f64, g2: f64) -> Result<Matrix2<f64>, ShearRangeError> {
    let gsq = g1 * g1 + g2 * g2;
    if gsq >= 1.0 {
        return Err(ShearRangeError {
            magnitude: gsq.sqrt(),
        });
    }
    let norm = 1.0 / (1.0 - gsq).sqrt();
    Ok(Matrix2::new(
        norm * (1.0 + g1),
        norm * g2,
        norm * g2,
        norm * (1.0 - g1),
    ))
}

/// Singular values of a 2x2 matrix as `(largest, smallest)`.
///
/// These are the semi-axes of the ellipse a unit circle maps onto.
pub fn singular_values(matrix: &Matrix2<f64>) -> (f64, f64) {
    let frob = matrix.iter().map(|v| v * v).sum::<f64>();
    let det = matrix.determinant().abs();
    let disc = (frob * frob - 4.0 * det * det).max(0.0).sqrt();
    let major = (0.5 * (frob + disc)).sqrt();
    let minor = if major > 0.0 { det / major } else { 0.0 };
    (major, minor)
}
