//! Special functions needed by radial profiles.
//!
//! Bessel J0/J1 and the gamma function come from `libm`, which stays
//! accurate for the large arguments Hankel transform integrands reach, and
//! `sinc` comes from `scilib`. Incomplete gamma and real-order `K_nu` are
//! evaluated here.

use crate::integrate::integrate;
use crate::roots::ConvergenceError;

pub use libm::{j0 as bessel_j0, j1 as bessel_j1, lgamma as ln_gamma, tgamma as gamma};
pub use scilib::math::basic::sinc;

const GAMMA_ITMAX: usize = 1000;
const GAMMA_EPS: f64 = 1e-15;
const FPMIN: f64 = 1e-300;

/// Regularized lower incomplete gamma function `P(a, x)`.
pub fn gamma_p(a: f64, x: f64) -> Result<f64, ConvergenceError> {
    if x <= 0.0 {
        return Ok(0.0);
    }
    if x < a + 1.0 {
        gamma_series(a, x)
    } else {
        Ok(1.0 - gamma_continued_fraction(a, x)?)
    }
}

/// Regularized upper incomplete gamma function `Q(a, x) = 1 - P(a, x)`.
pub fn gamma_q(a: f64, x: f64) -> Result<f64, ConvergenceError> {
    if x <= 0.0 {
        return Ok(1.0);
    }
    if x < a + 1.0 {
        Ok(1.0 - gamma_series(a, x)?)
    } else {
        gamma_continued_fraction(a, x)
    }
}

fn gamma_series(a: f64, x: f64) -> Result<f64, ConvergenceError> {
    let mut ap = a;
    let mut del = 1.0 / a;
    let mut sum = del;
    for _ in 0..GAMMA_ITMAX {
        ap += 1.0;
        del *= x / ap;
        sum += del;
        if del.abs() < sum.abs() * GAMMA_EPS {
            return Ok(sum * (-x + a * x.ln() - ln_gamma(a)).exp());
        }
    }
    Err(ConvergenceError::IterationLimit {
        iterations: GAMMA_ITMAX,
        width: del.abs(),
    })
}

/// Modified Lentz evaluation of the continued fraction for `Q(a, x)`.
fn gamma_continued_fraction(a: f64, x: f64) -> Result<f64, ConvergenceError> {
    let mut b = x + 1.0 - a;
    let mut c = 1.0 / FPMIN;
    let mut d = 1.0 / b;
    let mut h = d;
    for i in 1..=GAMMA_ITMAX {
        let an = -(i as f64) * (i as f64 - a);
        b += 2.0;
        d = an * d + b;
        if d.abs() < FPMIN {
            d = FPMIN;
        }
        c = b + an / c;
        if c.abs() < FPMIN {
            c = FPMIN;
        }
        d = 1.0 / d;
        let del = d * c;
        h *= del;
        if (del - 1.0).abs() < GAMMA_EPS {
            return Ok((-x + a * x.ln() - ln_gamma(a)).exp() * h);
        }
    }
    Err(ConvergenceError::IterationLimit {
        iterations: GAMMA_ITMAX,
        width: h.abs(),
    })
}

/// Modified Bessel function of the second kind `K_nu(x)` for real order and `x > 0`.
///
/// Evaluated from `K_nu(x) = ∫_0^∞ exp(-x cosh t) cosh(nu t) dt`, whose
/// integrand is smooth and decays doubly exponentially.
pub fn bessel_k(nu: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return f64::INFINITY;
    }
    if x > 700.0 {
        return 0.0;
    }
    let nu = nu.abs();
    let log_integrand = |t: f64| nu * t - x * (t.cosh() - 1.0);

    let mut peak = log_integrand(0.0);
    let mut t_max = 0.0;
    while t_max < 200.0 {
        t_max += 0.25;
        let v = log_integrand(t_max);
        peak = peak.max(v);
        if v < peak - 45.0 {
            break;
        }
    }

    let scaled = integrate(
        |t: f64| (-x * (t.cosh() - 1.0)).exp() * (nu * t).cosh(),
        0.0,
        t_max,
        1e-12,
        0.0,
    );
    scaled.value * (-x).exp()
}
