//! One-dimensional lookup tables for expensive radial functions.
//!
//! Profiles whose real- or Fourier-space values have no closed form
//! (Sersic kValue, Kolmogorov xValue, interpolant responses, cumulative
//! radial flux) tabulate them once and interpolate afterwards.
//!
//! # Interpolation kinds
//!
//! - `Linear`: piecewise linear between samples
//! - `Spline`: natural cubic spline (C² continuous)
//! - `Floor` / `Ceil`: step functions taking the lower / upper sample
//!
//! # Example
//!
//! ```
//! use profile_math::table::{Interpolation, Table};
//!
//! let table = Table::from_fn(0.0, 3.0, 301, |x| x.exp(), Interpolation::Spline).unwrap();
//! let approx_value = table.eval(2.3).unwrap();
//! assert!((approx_value - 2.3_f64.exp()).abs() < 1e-6);
//! ```

use thiserror::Error;

/// Error type for lookup table operations
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TableError {
    /// Value is outside the domain bounds
    #[error("value {value} is outside table domain [{min}, {max}]")]
    OutOfBounds { value: f64, min: f64, max: f64 },

    #[error("table needs at least {required} samples, got {got}")]
    TooFewPoints { required: usize, got: usize },

    #[error("table arguments must be strictly increasing (index {index})")]
    Unsorted { index: usize },

    #[error("arguments and values differ in length ({args} vs {vals})")]
    LengthMismatch { args: usize, vals: usize },
}

/// How to interpolate between tabulated samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    Linear,
    Spline,
    Floor,
    Ceil,
}

/// Tabulated function with sorted abscissae.
#[derive(Debug, Clone)]
pub struct Table {
    args: Vec<f64>,
    vals: Vec<f64>,
    interp: Interpolation,
    /// `[a, b, c, d]` cubic coefficients per segment (spline only)
    spline: Vec<[f64; 4]>,
    /// Set when the abscissae are evenly spaced, enabling O(1) lookup
    uniform_step: Option<f64>,
}

impl Table {
    /// Build a table from explicit samples.
    pub fn new(args: Vec<f64>, vals: Vec<f64>, interp: Interpolation) -> Result<Self, TableError> {
        if args.len() != vals.len() {
            return Err(TableError::LengthMismatch {
                args: args.len(),
                vals: vals.len(),
            });
        }
        let required = if interp == Interpolation::Spline { 3 } else { 2 };
        if args.len() < required {
            return Err(TableError::TooFewPoints {
                required,
                got: args.len(),
            });
        }
        if let Some(index) = (1..args.len()).find(|&i| args[i] <= args[i - 1]) {
            return Err(TableError::Unsorted { index });
        }

        let span = args[args.len() - 1] - args[0];
        let step = span / (args.len() - 1) as f64;
        let uniform = args
            .iter()
            .enumerate()
            .all(|(i, &a)| (a - (args[0] + i as f64 * step)).abs() <= 1e-10 * span.abs());

        let mut table = Self {
            args,
            vals,
            interp,
            spline: Vec::new(),
            uniform_step: uniform.then_some(step),
        };
        if interp == Interpolation::Spline {
            table.spline = table.compute_spline_coefficients();
        }
        Ok(table)
    }

    /// Precompute `f` on an evenly spaced grid of `n_points` over `[x_min, x_max]`.
    pub fn from_fn<F>(
        x_min: f64,
        x_max: f64,
        n_points: usize,
        f: F,
        interp: Interpolation,
    ) -> Result<Self, TableError>
    where
        F: Fn(f64) -> f64,
    {
        if n_points < 2 {
            return Err(TableError::TooFewPoints {
                required: 2,
                got: n_points,
            });
        }
        let dx = (x_max - x_min) / (n_points - 1) as f64;
        let args: Vec<f64> = (0..n_points).map(|i| x_min + i as f64 * dx).collect();
        let vals = args.iter().map(|&x| f(x)).collect();
        Self::new(args, vals, interp)
    }

    /// Solve the tridiagonal system for a natural cubic spline
    /// (Thomas algorithm) and return `[a, b, c, d]` per segment.
    fn compute_spline_coefficients(&self) -> Vec<[f64; 4]> {
        let x = &self.args;
        let y = &self.vals;
        let n = x.len();
        let h: Vec<f64> = (0..n - 1).map(|i| x[i + 1] - x[i]).collect();

        let mut alpha = vec![0.0; n - 1];
        for i in 1..n - 1 {
            alpha[i] = (3.0 / h[i]) * (y[i + 1] - y[i]) - (3.0 / h[i - 1]) * (y[i] - y[i - 1]);
        }

        let mut l = vec![1.0; n];
        let mut mu = vec![0.0; n];
        let mut z = vec![0.0; n];
        for i in 1..n - 1 {
            l[i] = 2.0 * (x[i + 1] - x[i - 1]) - h[i - 1] * mu[i - 1];
            mu[i] = h[i] / l[i];
            z[i] = (alpha[i] - h[i - 1] * z[i - 1]) / l[i];
        }

        let mut c = vec![0.0; n];
        let mut coeffs = vec![[0.0; 4]; n - 1];
        for j in (0..n - 1).rev() {
            c[j] = z[j] - mu[j] * c[j + 1];
            let b = (y[j + 1] - y[j]) / h[j] - h[j] * (c[j + 1] + 2.0 * c[j]) / 3.0;
            let d = (c[j + 1] - c[j]) / (3.0 * h[j]);
            coeffs[j] = [y[j], b, c[j], d];
        }
        coeffs
    }

    /// Index `i` of the segment `[args[i], args[i+1]]` holding `x`.
    fn segment(&self, x: f64) -> usize {
        let last = self.args.len() - 2;
        match self.uniform_step {
            Some(step) => {
                let i = ((x - self.args[0]) / step).floor();
                (i.max(0.0) as usize).min(last)
            }
            None => self
                .args
                .partition_point(|&a| a <= x)
                .saturating_sub(1)
                .min(last),
        }
    }

    /// Interpolated value at `x`.
    ///
    /// # Returns
    ///
    /// * `Ok(f64)` - Interpolated function value at x
    /// * `Err(TableError::OutOfBounds)` - If x is outside the tabulated domain
    pub fn eval(&self, x: f64) -> Result<f64, TableError> {
        let (min, max) = (self.arg_min(), self.arg_max());
        if !(min..=max).contains(&x) {
            return Err(TableError::OutOfBounds { value: x, min, max });
        }
        Ok(self.interpolate(x))
    }

    /// Interpolated value with `x` clamped into the tabulated domain.
    pub fn eval_clamped(&self, x: f64) -> f64 {
        self.interpolate(x.clamp(self.arg_min(), self.arg_max()))
    }

    fn interpolate(&self, x: f64) -> f64 {
        let i = self.segment(x);
        let (x0, x1) = (self.args[i], self.args[i + 1]);
        match self.interp {
            Interpolation::Linear => {
                let t = (x - x0) / (x1 - x0);
                self.vals[i] + t * (self.vals[i + 1] - self.vals[i])
            }
            Interpolation::Spline => {
                let [a, b, c, d] = self.spline[i];
                let dx = x - x0;
                a + dx * (b + dx * (c + dx * d))
            }
            Interpolation::Floor => {
                if x >= x1 {
                    self.vals[i + 1]
                } else {
                    self.vals[i]
                }
            }
            Interpolation::Ceil => {
                if x <= x0 {
                    self.vals[i]
                } else {
                    self.vals[i + 1]
                }
            }
        }
    }

    pub fn arg_min(&self) -> f64 {
        self.args[0]
    }

    pub fn arg_max(&self) -> f64 {
        self.args[self.args.len() - 1]
    }

    pub fn args(&self) -> &[f64] {
        &self.args
    }

    pub fn vals(&self) -> &[f64] {
        &self.vals
    }

    pub fn interpolation(&self) -> Interpolation {
        self.interp
    }
}
