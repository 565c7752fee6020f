//! 1-D interpolation kernels used (separably, in x and y) to turn a pixel
//! grid into a continuous profile.
//!
//! Kernels are in units of the sample spacing. Their Fourier transforms
//! `û(u) = ∫ K(x) exp(-iux) dx` are analytic for the nearest and linear
//! kernels and tabulated numerically for the others.

use std::f64::consts::PI;
use std::sync::Arc;

use once_cell::sync::Lazy;
use profile_math::{integrate, integrate_panels, sinc, Interpolation, Table};

use super::{cached_info, InfoCache};
use crate::error::{ProfileError, Result};
use crate::random::BaseDeviate;

/// Fourier tables stop here; every kernel's transform is negligible beyond.
const U_MAX: f64 = 16.0 * PI;
const U_SAMPLES: usize = 1601;
const SHOOT_SAMPLES: usize = 2001;

static KERNEL_TABLES: InfoCache<KernelTables> = Lazy::new(Default::default);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolant {
    Nearest,
    Linear,
    /// Keys cubic convolution kernel with `a = -1/2`.
    Cubic,
    /// `sinc(πx) sinc(πx/n)` for `|x| < n`.
    Lanczos(u32),
}

impl Default for Interpolant {
    fn default() -> Self {
        Interpolant::Lanczos(5)
    }
}

impl Interpolant {
    pub fn lanczos(n: u32) -> Result<Self> {
        if n == 0 {
            return Err(ProfileError::invalid("n", "lanczos order must be at least 1"));
        }
        Ok(Interpolant::Lanczos(n))
    }

    /// Half-width of the kernel's support.
    pub fn range(&self) -> f64 {
        match self {
            Interpolant::Nearest => 0.5,
            Interpolant::Linear => 1.0,
            Interpolant::Cubic => 2.0,
            Interpolant::Lanczos(n) => *n as f64,
        }
    }

    pub fn x_value(&self, x: f64) -> f64 {
        let ax = x.abs();
        match self {
            Interpolant::Nearest => {
                if ax < 0.5 {
                    1.0
                } else if ax == 0.5 {
                    0.5
                } else {
                    0.0
                }
            }
            Interpolant::Linear => (1.0 - ax).max(0.0),
            Interpolant::Cubic => {
                if ax <= 1.0 {
                    (1.5 * ax - 2.5) * ax * ax + 1.0
                } else if ax < 2.0 {
                    ((-0.5 * ax + 2.5) * ax - 4.0) * ax + 2.0
                } else {
                    0.0
                }
            }
            Interpolant::Lanczos(n) => {
                let n = *n as f64;
                if ax >= n {
                    0.0
                } else {
                    sinc(PI * x) * sinc(PI * x / n)
                }
            }
        }
    }

    pub fn u_value(&self, u: f64) -> Result<f64> {
        Ok(self.tables()?.u_value(u))
    }

    pub(crate) fn tables(&self) -> Result<Arc<KernelTables>> {
        let key = match self {
            Interpolant::Nearest => vec![0, 0],
            Interpolant::Linear => vec![1, 0],
            Interpolant::Cubic => vec![2, 0],
            Interpolant::Lanczos(n) => vec![3, u64::from(*n)],
        };
        cached_info(&KERNEL_TABLES, key, || KernelTables::new(*self))
    }
}

/// Precomputed transform and shooting distribution of one kernel.
#[derive(Debug)]
pub(crate) struct KernelTables {
    kernel: Interpolant,
    u_table: Option<Table>,
    /// `∫ |K(x)| dx`
    abs_integral: f64,
    /// Inverse cumulative distribution of `|K|` over its support.
    inverse_abs_cdf: Table,
}

impl KernelTables {
    fn new(kernel: Interpolant) -> Result<Self> {
        let range = kernel.range();
        let edges: Vec<f64> = (0..=(4.0 * range) as usize).map(|i| i as f64 * 0.25).collect();
        let u_table = match kernel {
            Interpolant::Nearest | Interpolant::Linear => None,
            _ => {
                let transform = |u: f64| {
                    2.0 * integrate_panels(|x| kernel.x_value(x) * (u * x).cos(), &edges, 1e-10, 1e-13).value
                };
                Some(Table::from_fn(0.0, U_MAX, U_SAMPLES, transform, Interpolation::Spline)?)
            }
        };

        // cumulative |K| on a uniform grid over [-range, range]
        let step = 2.0 * range / (SHOOT_SAMPLES - 1) as f64;
        let mut args = vec![0.0];
        let mut vals = vec![-range];
        let mut total = 0.0;
        for i in 1..SHOOT_SAMPLES {
            let a = -range + (i - 1) as f64 * step;
            total += integrate(|x| kernel.x_value(x).abs(), a, a + step, 1e-10, 0.0).value;
            if total > *args.last().unwrap_or(&0.0) {
                args.push(total);
                vals.push(a + step);
            }
        }
        let abs_integral = total;
        let args = args.into_iter().map(|c| c / abs_integral).collect();
        let inverse_abs_cdf = Table::new(args, vals, Interpolation::Linear)?;
        Ok(Self {
            kernel,
            u_table,
            abs_integral,
            inverse_abs_cdf,
        })
    }

    pub(crate) fn kernel(&self) -> Interpolant {
        self.kernel
    }

    pub(crate) fn u_value(&self, u: f64) -> f64 {
        let u = u.abs();
        match self.kernel {
            Interpolant::Nearest => sinc(0.5 * u),
            Interpolant::Linear => {
                let s = sinc(0.5 * u);
                s * s
            }
            _ => match &self.u_table {
                Some(table) if u <= U_MAX => table.eval_clamped(u),
                _ => 0.0,
            },
        }
    }

    /// Largest `u <= U_MAX` where `|û(u)| >= threshold`.
    pub(crate) fn u_range(&self, threshold: f64) -> f64 {
        let step = 0.01 * PI;
        let mut u = U_MAX;
        while u > 0.0 && self.u_value(u).abs() < threshold {
            u -= step;
        }
        u.max(step)
    }

    pub(crate) fn abs_integral(&self) -> f64 {
        self.abs_integral
    }

    /// Offset drawn from `|K|`, with the sign of `K` there.
    pub(crate) fn sample(&self, rng: &mut BaseDeviate) -> (f64, f64) {
        let x = self.inverse_abs_cdf.eval_clamped(rng.uniform());
        let sign = if self.kernel.x_value(x) < 0.0 { -1.0 } else { 1.0 };
        (x, sign)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_kernels_interpolate_nodes() {
        for kernel in [Interpolant::Linear, Interpolant::Cubic, Interpolant::Lanczos(3)] {
            assert_relative_eq!(kernel.x_value(0.0), 1.0);
            for i in 1..4 {
                assert!(kernel.x_value(i as f64).abs() < 1e-15, "{kernel:?} at {i}");
            }
        }
        assert_eq!(Interpolant::Nearest.x_value(0.3), 1.0);
        assert_eq!(Interpolant::Nearest.x_value(0.7), 0.0);
    }

    #[test]
    fn test_cubic_is_continuous() {
        let k = Interpolant::Cubic;
        assert_relative_eq!(k.x_value(1.0 - 1e-12), k.x_value(1.0 + 1e-12), epsilon = 1e-10);
        assert_relative_eq!(k.x_value(2.0 - 1e-12), 0.0, epsilon = 1e-10);
    }

    #[test]
    fn test_transforms_at_zero_are_kernel_area() {
        for kernel in [Interpolant::Nearest, Interpolant::Linear, Interpolant::Cubic] {
            assert_relative_eq!(kernel.u_value(0.0).unwrap(), 1.0, epsilon = 1e-9);
        }
        // Lanczos kernels are unit-area only approximately
        assert_relative_eq!(Interpolant::Lanczos(5).u_value(0.0).unwrap(), 1.0, epsilon = 2e-3);
    }

    #[test]
    fn test_cubic_transform_vanishes_at_sampling_harmonics() {
        // interpolating kernels pass no power at u = 2π m, m != 0
        let k = Interpolant::Cubic;
        assert!(k.u_value(2.0 * PI).unwrap().abs() < 1e-6);
        assert!(k.u_value(4.0 * PI).unwrap().abs() < 1e-6);
        assert_eq!(k.u_value(U_MAX + 1.0).unwrap(), 0.0);
    }

    #[test]
    fn test_shooting_distribution() {
        let tables = Interpolant::Linear.tables().unwrap();
        assert_relative_eq!(tables.abs_integral(), 1.0, epsilon = 1e-9);
        let mut rng = BaseDeviate::new(6);
        let samples: Vec<f64> = (0..20_000).map(|_| tables.sample(&mut rng).0).collect();
        let mean_abs = samples.iter().map(|x| x.abs()).sum::<f64>() / samples.len() as f64;
        // E|x| = 1/3 for the triangle kernel
        assert_relative_eq!(mean_abs, 1.0 / 3.0, epsilon = 0.01);

        let cubic = Interpolant::Cubic.tables().unwrap();
        assert!(cubic.abs_integral() > 1.0);
        assert!(cubic.u_range(1e-3) < U_MAX);
    }

    #[test]
    fn test_lanczos_order_validated() {
        assert!(Interpolant::lanczos(0).is_err());
        assert_eq!(Interpolant::lanczos(3).unwrap().range(), 3.0);
    }
}
