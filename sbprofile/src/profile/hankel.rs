//! Zeroth-order Hankel transforms and the log-spaced tables built from them.
//!
//! For an axisymmetric profile `f(r)` the 2-D Fourier transform reduces to
//! `F(k) = 2π ∫ r f(r) J0(k r) dr`, and the inverse to
//! `f(r) = 1/(2π) ∫ k F(k) J0(k r) dk`. Both are evaluated panel by panel,
//! with geometric panels near the origin (cusps) and panels of half an
//! oscillation period further out.

use std::f64::consts::PI;

use log::debug;
use profile_math::{bessel_j0, integrate_panels, ConvergenceError, Interpolation, Table};

use crate::error::{ProfileError, Result};

/// Panel edges on `[0, r_max]` for an integrand oscillating like `J0(k r)`.
fn panel_edges(k: f64, r_max: f64) -> Vec<f64> {
    let half_period = if k > 0.0 { PI / k } else { f64::INFINITY };
    let first = half_period.min(r_max);
    let mut edges = vec![0.0];
    let mut r = first * 1e-8;
    while r < first {
        edges.push(r);
        r *= 10.0;
    }
    edges.push(first);
    let mut r = first + half_period;
    while r < r_max {
        edges.push(r);
        r += half_period;
    }
    if *edges.last().unwrap_or(&0.0) < r_max {
        edges.push(r_max);
    }
    edges
}

/// `2π ∫_0^r_max r f(r) J0(k r) dr`
pub(crate) fn hankel_forward<F: Fn(f64) -> f64>(f: &F, k: f64, r_max: f64, rel_tol: f64, abs_tol: f64) -> f64 {
    let edges = panel_edges(k, r_max);
    2.0 * PI * integrate_panels(|r| r * f(r) * bessel_j0(k * r), &edges, rel_tol, abs_tol / (2.0 * PI)).value
}

/// `1/(2π) ∫_0^k_max k F(k) J0(k r) dk`
pub(crate) fn hankel_inverse<F: Fn(f64) -> f64>(f: &F, r: f64, k_max: f64, rel_tol: f64, abs_tol: f64) -> f64 {
    let edges = panel_edges(r, k_max);
    integrate_panels(|k| k * f(k) * bessel_j0(k * r), &edges, rel_tol, abs_tol * 2.0 * PI).value / (2.0 * PI)
}

/// Radial function tabulated against `ln(arg)` with controlled behaviour
/// outside the table: a quadratic approach to the value at zero below, and
/// a power-law tail above.
#[derive(Debug, Clone)]
pub(crate) struct LogTable {
    table: Table,
    arg_min: f64,
    arg_max: f64,
    value_at_zero: f64,
    /// Power-law slope used beyond `arg_max`; `None` means zero there.
    tail_slope: Option<f64>,
}

impl LogTable {
    /// Tabulate `f` from `arg_min` upward in steps of `ln_step` in `ln(arg)`
    /// until `|f| < stop_below` for a few consecutive samples or `arg_cap`
    /// is reached. A non-finite sample fails the build.
    pub(crate) fn build<F: Fn(f64) -> f64>(
        f: F,
        value_at_zero: f64,
        arg_min: f64,
        arg_cap: f64,
        ln_step: f64,
        stop_below: f64,
    ) -> Result<Self> {
        let mut ln_args = Vec::new();
        let mut vals = Vec::new();
        let mut quiet = 0;
        let mut ln_a = arg_min.ln();
        let ln_cap = arg_cap.ln();
        while ln_a <= ln_cap {
            let arg = ln_a.exp();
            let v = f(arg);
            if !v.is_finite() {
                return Err(ProfileError::numerical("log table", ConvergenceError::NonFinite { at: arg, value: v }));
            }
            ln_args.push(ln_a);
            vals.push(v);
            if v.abs() < stop_below {
                quiet += 1;
                if quiet >= 5 {
                    break;
                }
            } else {
                quiet = 0;
            }
            ln_a += ln_step;
        }
        let n = vals.len();
        let tail_slope = if n >= 2 && vals[n - 1] > 0.0 && vals[n - 2] > vals[n - 1] {
            Some((vals[n - 1] / vals[n - 2]).ln() / (ln_args[n - 1] - ln_args[n - 2]))
        } else {
            None
        };
        let arg_max = ln_args.last().map_or(arg_min, |a| a.exp());
        debug!("log table: {} samples on [{:.3e}, {:.3e}]", n, arg_min, arg_max);
        let table = Table::new(ln_args, vals, Interpolation::Spline)?;
        Ok(Self {
            table,
            arg_min,
            arg_max,
            value_at_zero,
            tail_slope,
        })
    }

    pub(crate) fn eval(&self, arg: f64) -> f64 {
        if arg <= self.arg_min {
            let v_min = self.table.eval_clamped(self.arg_min.ln());
            let t = arg / self.arg_min;
            return self.value_at_zero + (v_min - self.value_at_zero) * t * t;
        }
        if arg >= self.arg_max {
            let v_max = self.table.eval_clamped(self.arg_max.ln());
            return match self.tail_slope {
                Some(slope) => v_max * (arg / self.arg_max).powf(slope),
                None => 0.0,
            };
        }
        self.table.eval_clamped(arg.ln())
    }

    pub(crate) fn arg_max(&self) -> f64 {
        self.arg_max
    }

    /// Largest tabulated argument where `|f| >= threshold`, or `arg_min`.
    pub(crate) fn last_above(&self, threshold: f64) -> f64 {
        self.table
            .args()
            .iter()
            .zip(self.table.vals())
            .rev()
            .find(|(_, v)| v.abs() >= threshold)
            .map_or(self.arg_min, |(a, _)| a.exp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_gaussian_hankel_pair() {
        // f(r) = exp(-r²/2) / (2π) has F(k) = exp(-k²/2)
        let f = |r: f64| (-0.5 * r * r).exp() / (2.0 * PI);
        for &k in &[0.0, 0.5, 1.0, 2.5, 4.0] {
            let got = hankel_forward(&f, k, 12.0, 1e-10, 1e-14);
            assert_relative_eq!(got, (-0.5 * k * k).exp(), epsilon = 1e-8);
        }
        let fk = |k: f64| (-0.5 * k * k).exp();
        assert_relative_eq!(hankel_inverse(&fk, 1.3, 12.0, 1e-10, 1e-14), f(1.3), epsilon = 1e-9);
    }

    #[test]
    fn test_exponential_transform() {
        // f(r) = exp(-r) / (2π) has F(k) = (1 + k²)^-1.5
        let f = |r: f64| (-r).exp() / (2.0 * PI);
        for &k in &[0.1, 1.0, 10.0, 40.0] {
            let got = hankel_forward(&f, k, 50.0, 1e-10, 1e-13);
            assert_relative_eq!(got, (1.0 + k * k).powf(-1.5), epsilon = 1e-8);
        }
    }

    #[test]
    fn test_log_table_interpolates_and_extrapolates() {
        let f = |k: f64| (1.0 + k * k).powf(-1.5);
        let table = LogTable::build(f, 1.0, 1e-3, 1e4, 0.02, 1e-9).unwrap();
        assert_relative_eq!(table.eval(0.0), 1.0, epsilon = 1e-12);
        assert_relative_eq!(table.eval(2.0), f(2.0), epsilon = 1e-7);
        let beyond = 2.0 * table.arg_max();
        assert_relative_eq!(table.eval(beyond), f(beyond), max_relative = 1e-2);
        assert!(table.last_above(1e-3) > 9.0);
    }

    #[test]
    fn test_non_finite_samples_fail_the_build() {
        let f = |k: f64| if k > 5.0 { f64::NAN } else { (-k).exp() };
        let err = LogTable::build(f, 1.0, 1e-3, 1e4, 0.05, 1e-12).unwrap_err();
        match err {
            ProfileError::NumericalFailure {
                source: ConvergenceError::NonFinite { at, value },
                ..
            } => {
                assert!(at > 5.0 && at < 5.3);
                assert!(value.is_nan());
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
