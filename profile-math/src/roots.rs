//! Bracketing root finders.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConvergenceError {
    #[error("root not bracketed: f({lo})={f_lo:.3e}, f({hi})={f_hi:.3e}")]
    NotBracketed { lo: f64, hi: f64, f_lo: f64, f_hi: f64 },

    #[error("no convergence after {iterations} iterations (width {width:.3e})")]
    IterationLimit { iterations: usize, width: f64 },

    #[error("non-finite value {value} at {at:.3e}")]
    NonFinite { at: f64, value: f64 },
}

/// Find `x` in `[lo, hi]` with `f(x) == 0` by bisection.
///
/// Stops once the bracket is narrower than `rel_tol * |x|` (or `rel_tol` for
/// roots near zero). Fails if the signs at the ends agree or the bracket does
/// not shrink enough within `max_iter` halvings.
pub fn bisect<F>(f: F, mut lo: f64, mut hi: f64, rel_tol: f64, max_iter: usize) -> Result<f64, ConvergenceError>
where
    F: Fn(f64) -> f64,
{
    let mut f_lo = f(lo);
    let f_hi = f(hi);
    if f_lo == 0.0 {
        return Ok(lo);
    }
    if f_hi == 0.0 {
        return Ok(hi);
    }
    if f_lo.signum() == f_hi.signum() || f_lo.is_nan() || f_hi.is_nan() {
        return Err(ConvergenceError::NotBracketed { lo, hi, f_lo, f_hi });
    }

    for _ in 0..max_iter {
        let mid = 0.5 * (lo + hi);
        if (hi - lo) <= rel_tol * mid.abs().max(1.0e-300) || (hi - lo) <= f64::EPSILON * mid.abs() {
            return Ok(mid);
        }
        let f_mid = f(mid);
        if f_mid == 0.0 {
            return Ok(mid);
        }
        if f_mid.signum() == f_lo.signum() {
            lo = mid;
            f_lo = f_mid;
        } else {
            hi = mid;
        }
    }

    Err(ConvergenceError::IterationLimit {
        iterations: max_iter,
        width: hi - lo,
    })
}

/// Grow `hi` geometrically until `f` changes sign between `lo` and `hi`.
pub fn bracket_upward<F>(f: F, lo: f64, mut hi: f64, max_iter: usize) -> Result<(f64, f64), ConvergenceError>
where
    F: Fn(f64) -> f64,
{
    let f_lo = f(lo);
    let mut lower = lo;
    for _ in 0..max_iter {
        let f_hi = f(hi);
        if f_hi.signum() != f_lo.signum() {
            return Ok((lower, hi));
        }
        lower = hi;
        hi *= 2.0;
    }
    Err(ConvergenceError::NotBracketed {
        lo,
        hi,
        f_lo,
        f_hi: f(hi),
    })
}
