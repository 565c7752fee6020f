//! A sampled image turned into a continuous profile by separable kernel
//! interpolation.
//!
//! Pixel values are taken as flux per pixel, so the surface brightness is
//! `I(x, y) = Σ_ij v_ij K((x - x_i)/dx) K((y - y_j)/dx) / dx²` with the
//! sample grid centred on the origin. The Fourier transform follows exactly
//! from the same sum, `û(kx dx) û(ky dx) Σ_ij v_ij exp(-i k·x_ij)`, evaluated
//! separably.

use std::f64::consts::PI;
use std::sync::Arc;

use log::debug;
use nalgebra::Vector2;
use ndarray::Array2;
use rustfft::num_complex::Complex64;

use super::interpolant::KernelTables;
use super::{Interpolant, Support, SurfaceBrightness};
use crate::error::{require_finite, ProfileError, Result};
use crate::image::{Image, Pixel};
use crate::params::GsParams;
use crate::photon::PhotonArray;
use crate::random::BaseDeviate;

#[derive(Debug, Clone)]
pub struct InterpolatedImage {
    /// Samples indexed `[[row, col]]`, i.e. `[[y, x]]`.
    values: Arc<Array2<f64>>,
    /// Running sum of `|v|` in row-major order, for choosing photon pixels.
    abs_cumulative: Arc<Vec<f64>>,
    pixel_scale: f64,
    /// Position of sample `[[0, 0]]` relative to the profile centre.
    origin: Vector2<f64>,
    /// Multiplies every sample; changed by [`InterpolatedImage::with_flux`].
    flux_scale: f64,
    raw_flux: f64,
    raw_centroid: Vector2<f64>,
    max_abs_value: f64,
    kernel: Arc<KernelTables>,
    gsparams: GsParams,
}

impl InterpolatedImage {
    /// Interpolate `image` with `interpolant`. The image's pixel scale
    /// becomes the sample spacing.
    pub fn new<T: Pixel>(image: &Image<T>, interpolant: Interpolant) -> Result<Self> {
        let values = image.array().mapv(|v| v.to_f64());
        if values.is_empty() {
            return Err(ProfileError::invalid("image", "cannot interpolate an empty image"));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ProfileError::invalid("image", "contains non-finite pixels"));
        }
        let dx = image.scale();
        let (nrow, ncol) = values.dim();
        let origin = Vector2::new(-0.5 * (ncol as f64 - 1.0) * dx, -0.5 * (nrow as f64 - 1.0) * dx);

        let mut abs_cumulative = Vec::with_capacity(values.len());
        let mut running = 0.0;
        let mut weighted = Vector2::zeros();
        let mut sum = 0.0;
        for ((j, i), &v) in values.indexed_iter() {
            running += v.abs();
            abs_cumulative.push(running);
            sum += v;
            weighted += v * (origin + Vector2::new(i as f64 * dx, j as f64 * dx));
        }
        if running == 0.0 {
            return Err(ProfileError::invalid("image", "all pixels are zero"));
        }

        let kernel = interpolant.tables()?;
        let u0 = kernel.u_value(0.0);
        let raw_centroid = if sum != 0.0 { weighted / sum } else { Vector2::zeros() };
        let max_abs_value = values.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
        debug!("interpolated image {ncol}x{nrow}, dx={dx}, {interpolant:?}, flux={:.6}", sum * u0 * u0);
        Ok(Self {
            values: Arc::new(values),
            abs_cumulative: Arc::new(abs_cumulative),
            pixel_scale: dx,
            origin,
            flux_scale: 1.0,
            raw_flux: sum * u0 * u0,
            raw_centroid,
            max_abs_value,
            kernel,
            gsparams: GsParams::default(),
        })
    }

    pub fn with_gsparams(mut self, gsparams: GsParams) -> Result<Self> {
        gsparams.validate()?;
        self.gsparams = gsparams;
        Ok(self)
    }

    /// Rescale every sample so the total flux becomes `flux`.
    pub fn with_flux(&self, flux: f64) -> Result<Self> {
        let flux = require_finite("flux", flux)?;
        if self.raw_flux == 0.0 {
            return Err(ProfileError::invalid("flux", "image has zero net flux"));
        }
        Ok(Self {
            flux_scale: flux / self.raw_flux,
            ..self.clone()
        })
    }

    pub fn interpolant(&self) -> Interpolant {
        self.kernel.kernel()
    }

    pub fn pixel_scale(&self) -> f64 {
        self.pixel_scale
    }

    /// Kernel values at the samples whose support covers `t` (in sample
    /// units from sample 0), as `(first_index, weights)`.
    fn weights(&self, t: f64, n: usize) -> (usize, Vec<f64>) {
        let kernel = self.kernel.kernel();
        let range = kernel.range();
        let lo = (t - range).ceil().max(0.0);
        let hi = (t + range).floor().min(n as f64 - 1.0);
        if hi < lo {
            return (0, Vec::new());
        }
        let first = lo as usize;
        let weights = (first..=hi as usize).map(|i| kernel.x_value(t - i as f64)).collect();
        (first, weights)
    }

    fn half_extent(&self) -> Vector2<f64> {
        let range = self.kernel.kernel().range() * self.pixel_scale;
        Vector2::new(-self.origin.x + range, -self.origin.y + range)
    }
}

impl SurfaceBrightness for InterpolatedImage {
    fn kind(&self) -> &'static str {
        "InterpolatedImage"
    }

    fn x_value(&self, pos: &Vector2<f64>) -> f64 {
        let dx = self.pixel_scale;
        let (nrow, ncol) = self.values.dim();
        let (i0, wx) = self.weights((pos.x - self.origin.x) / dx, ncol);
        let (j0, wy) = self.weights((pos.y - self.origin.y) / dx, nrow);
        let mut total = 0.0;
        for (dj, &ky) in wy.iter().enumerate() {
            if ky == 0.0 {
                continue;
            }
            let row = self.values.row(j0 + dj);
            let partial: f64 = wx.iter().enumerate().map(|(di, &kx)| kx * row[i0 + di]).sum();
            total += ky * partial;
        }
        self.flux_scale * total / (dx * dx)
    }

    fn k_value(&self, k: &Vector2<f64>) -> Complex64 {
        let dx = self.pixel_scale;
        let envelope = self.kernel.u_value(k.x * dx) * self.kernel.u_value(k.y * dx);
        if envelope == 0.0 {
            return Complex64::new(0.0, 0.0);
        }
        let (nrow, ncol) = self.values.dim();
        let phase_x: Vec<Complex64> = (0..ncol)
            .map(|i| Complex64::from_polar(1.0, -k.x * (self.origin.x + i as f64 * dx)))
            .collect();
        let mut total = Complex64::new(0.0, 0.0);
        for j in 0..nrow {
            let row = self.values.row(j);
            let row_sum: Complex64 = row.iter().zip(&phase_x).map(|(&v, p)| *p * v).sum();
            total += row_sum * Complex64::from_polar(1.0, -k.y * (self.origin.y + j as f64 * dx));
        }
        total * (self.flux_scale * envelope)
    }

    fn flux(&self) -> f64 {
        self.flux_scale * self.raw_flux
    }

    fn step_k(&self) -> f64 {
        let r = self.half_extent().norm();
        PI / r
    }

    fn max_k(&self) -> f64 {
        self.kernel.u_range(self.gsparams.maxk_threshold) / self.pixel_scale
    }

    fn centroid(&self) -> Vector2<f64> {
        self.raw_centroid
    }

    fn is_axisymmetric(&self) -> bool {
        false
    }

    fn has_hard_edges(&self) -> bool {
        self.kernel.kernel() == Interpolant::Nearest
    }

    fn max_sb(&self) -> f64 {
        // largest Σ|K(t - i)| over a unit cell bounds each 1-D weight sum
        let kernel = self.kernel.kernel();
        let n = kernel.range().ceil() as i32 + 1;
        let spread = (0..64)
            .map(|s| {
                let t = s as f64 / 64.0;
                (-n..=n).map(|i| kernel.x_value(t - i as f64).abs()).sum::<f64>()
            })
            .fold(0.0_f64, f64::max);
        let dx = self.pixel_scale;
        (self.flux_scale * self.max_abs_value).abs() * spread * spread / (dx * dx)
    }

    fn support(&self) -> Support {
        let h = self.half_extent();
        Support::rectangle(2.0 * h.x, 2.0 * h.y)
    }

    /// Each photon picks a sample with probability `|v| / Σ|v|` and an
    /// offset from `|K|` in each axis; its flux carries the product of the
    /// signs so the total is unbiased.
    fn shoot(&self, n: usize, rng: &mut BaseDeviate) -> Result<PhotonArray> {
        let mut photons = PhotonArray::new(n);
        if n == 0 {
            return Ok(photons);
        }
        let total_abs = self.abs_cumulative.last().copied().unwrap_or(0.0);
        let abs_k = self.kernel.abs_integral();
        let each = self.flux_scale.abs() * total_abs * abs_k * abs_k / n as f64;
        let sign_scale = self.flux_scale.signum();
        let (_, ncol) = self.values.dim();
        let dx = self.pixel_scale;
        for p in 0..n {
            let target = rng.uniform() * total_abs;
            let idx = self
                .abs_cumulative
                .partition_point(|&c| c <= target)
                .min(self.abs_cumulative.len() - 1);
            let (j, i) = (idx / ncol, idx % ncol);
            let v = self.values[[j, i]];
            let (ox, sx) = self.kernel.sample(rng);
            let (oy, sy) = self.kernel.sample(rng);
            let x = self.origin.x + (i as f64 + ox) * dx;
            let y = self.origin.y + (j as f64 + oy) * dx;
            photons.set_photon(p, x, y, sign_scale * v.signum() * sx * sy * each);
        }
        Ok(photons)
    }

    fn gsparams(&self) -> &GsParams {
        &self.gsparams
    }
}
