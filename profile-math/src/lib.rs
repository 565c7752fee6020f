//! profile-math - Numerical building blocks for surface-brightness profiles
//!
//! This crate holds the profile-agnostic numerics the rendering core leans on:
//!
//! - **Matrix** - 2x2 jacobian helpers (inversion, rotation, shear, singular values)
//! - **Special functions** - gamma, incomplete gamma, Bessel J0/J1/K_nu, sinc
//! - **Roots** - bracketing bisection with an explicit iteration budget
//! - **Quadrature** - adaptive Gauss-Kronrod integration, optionally panelled
//! - **Tables** - tabulated functions with linear/spline/step interpolation
//!
//! # Example
//!
//! ```
//! use profile_math::{gamma_p, bisect};
//!
//! // Sersic b_n for n = 1 solves P(2, b) = 1/2
//! let b = bisect(|b| gamma_p(2.0, b).unwrap() - 0.5, 0.1, 10.0, 1e-10, 200).unwrap();
//! assert!((b - 1.678_346_99).abs() < 1e-6);
//! ```

pub mod integrate;
pub mod matrix2;
pub mod roots;
pub mod special;
pub mod table;

// Re-export commonly used types
pub use integrate::{integrate, integrate_panels, Quadrature};
pub use matrix2::{
    invert_matrix, rotation_matrix, scale_matrix, shear_matrix, singular_values, ShearRangeError,
    SingularMatrixError,
};
pub use roots::{bisect, bracket_upward, ConvergenceError};
pub use special::{bessel_j0, bessel_j1, bessel_k, gamma, gamma_p, gamma_q, ln_gamma, sinc};
pub use table::{Interpolation, Table, TableError};
