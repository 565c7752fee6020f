//! Fourier-space rendering.
//!
//! The profile's `k_value` fills an `N x N` grid with spacing
//! `dk = 2π / (N scale)`, which is inverse transformed with row then column
//! passes of a 1-D complex FFT. `N` is a good FFT size large enough for both
//! the target image and the real-space period `2π / stepK`.

use std::f64::consts::PI;

use log::debug;
use nalgebra::Vector2;
use ndarray::Array2;
use rustfft::{num_complex::Complex64, FftPlanner};

use super::{DrawReport, Placement};
use crate::error::Result;
use crate::image::Bounds;
use crate::profile::Profile;

/// Smallest even `2^k` or `3 * 2^k` that is at least `n`, saturating at
/// the largest power of two a `usize` holds.
pub fn good_fft_size(n: usize) -> usize {
    let n = n.max(2);
    let pow2 = n.checked_next_power_of_two().unwrap_or(1 << (usize::BITS - 1));
    let three = 3 * (pow2 / 4);
    if pow2 >= 8 && three >= n {
        three
    } else {
        pow2
    }
}

pub(crate) fn render(
    profile: &Profile,
    bounds: &Bounds,
    scale: f64,
    placement: &Placement,
    wmult: f64,
    report: &mut DrawReport,
) -> Result<Array2<f64>> {
    let gsparams = profile.gsparams();
    let needed = (wmult * 2.0 * PI / (profile.step_k() * scale)).ceil();
    let image_side = bounds.ncol().max(bounds.nrow());
    let mut n = if needed.is_finite() && needed <= gsparams.maximum_fft_size as f64 {
        good_fft_size((needed as usize).max(image_side).max(gsparams.minimum_fft_size))
    } else {
        usize::MAX
    };
    if n > gsparams.maximum_fft_size {
        report.warn(format!(
            "FFT size {:.0} exceeds the maximum {}; clamping, expect folding",
            needed.max(n.min(1 << 53) as f64),
            gsparams.maximum_fft_size
        ));
        n = gsparams.maximum_fft_size & !1;
    }
    let nyquist = PI / scale;
    if profile.max_k() > nyquist {
        report.warn(format!(
            "maxK {:.4} is beyond the Nyquist frequency {:.4} of scale {scale}; expect aliasing",
            profile.max_k(),
            nyquist
        ));
    }
    debug!("FFT draw of {} on a {n}x{n} grid", profile.kind());

    let grid = fourier_grid(profile, n, scale, &placement.frac);

    let half = (n / 2) as i64;
    let mut out = Array2::zeros((bounds.nrow(), bounds.ncol()));
    for ((row, col), v) in out.indexed_iter_mut() {
        let gx = bounds.xmin as i64 + col as i64 - placement.pixel.0 + half;
        let gy = bounds.ymin as i64 + row as i64 - placement.pixel.1 + half;
        if (0..n as i64).contains(&gx) && (0..n as i64).contains(&gy) {
            *v = grid[(gy as usize, gx as usize)];
        }
    }
    Ok(out)
}

/// Real-space values on `x_i = (i - N/2) * scale - frac * scale`.
fn fourier_grid(profile: &Profile, n: usize, scale: f64, frac: &Vector2<f64>) -> Array2<f64> {
    let dk = 2.0 * PI / (n as f64 * scale);
    let shift = frac * scale;
    let freq = |j: usize| -> i64 {
        if j <= n / 2 {
            j as i64
        } else {
            j as i64 - n as i64
        }
    };

    // (-1)^m recenters the transform on index N/2
    let mut buf: Vec<Complex64> = Vec::with_capacity(n * n);
    for row in 0..n {
        let my = freq(row);
        for col in 0..n {
            let mx = freq(col);
            let k = Vector2::new(mx as f64 * dk, my as f64 * dk);
            let sign = if (mx + my).rem_euclid(2) == 0 { 1.0 } else { -1.0 };
            let phase = Complex64::from_polar(sign, -k.dot(&shift));
            buf.push(profile.kval(&k) * phase);
        }
    }

    let mut planner = FftPlanner::new();
    let inverse_fft = planner.plan_fft_inverse(n);
    inverse_fft.process(&mut buf);
    let mut transposed = transpose(&buf, n);
    inverse_fft.process(&mut transposed);
    let values = transpose(&transposed, n);

    let norm = 1.0 / (n as f64 * scale).powi(2);
    Array2::from_shape_fn((n, n), |(r, c)| values[r * n + c].re * norm)
}

fn transpose(buf: &[Complex64], n: usize) -> Vec<Complex64> {
    let mut out = vec![Complex64::new(0.0, 0.0); n * n];
    for r in 0..n {
        for c in 0..n {
            out[c * n + r] = buf[r * n + c];
        }
    }
    out
}
