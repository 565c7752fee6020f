//! Photon lists produced by shooting a profile.
//!
//! A [`PhotonArray`] is a set of positions with a (possibly negative) flux
//! each. Positions are in the profile's own units until the renderer maps
//! them to pixel coordinates, where pixel `(ix, iy)` covers
//! `[ix - 0.5, ix + 0.5) x [iy - 0.5, iy + 0.5)`.

pub mod radial;
pub mod sensor;

pub use radial::RadialSampler;
pub use sensor::Sensor;

use sensor::nearest_pixel;

use crate::error::{ProfileError, Result};
use crate::image::{ImageViewMut, Pixel};
use crate::random::BaseDeviate;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhotonArray {
    x: Vec<f64>,
    y: Vec<f64>,
    flux: Vec<f64>,
    /// Photon order carries information (e.g. photons grouped by source),
    /// so convolving two such arrays must shuffle one of them.
    is_correlated: bool,
}

impl PhotonArray {
    /// `n` photons at the origin with zero flux.
    pub fn new(n: usize) -> Self {
        Self {
            x: vec![0.0; n],
            y: vec![0.0; n],
            flux: vec![0.0; n],
            is_correlated: false,
        }
    }

    pub fn with_capacity(n: usize) -> Self {
        Self {
            x: Vec::with_capacity(n),
            y: Vec::with_capacity(n),
            flux: Vec::with_capacity(n),
            is_correlated: false,
        }
    }

    pub fn from_parts(x: Vec<f64>, y: Vec<f64>, flux: Vec<f64>) -> Result<Self> {
        if x.len() != y.len() || x.len() != flux.len() {
            return Err(ProfileError::invalid(
                "photons",
                format!("length mismatch: x={}, y={}, flux={}", x.len(), y.len(), flux.len()),
            ));
        }
        Ok(Self {
            x,
            y,
            flux,
            is_correlated: false,
        })
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn x(&self) -> &[f64] {
        &self.x
    }

    pub fn y(&self) -> &[f64] {
        &self.y
    }

    pub fn flux(&self) -> &[f64] {
        &self.flux
    }

    pub fn push(&mut self, x: f64, y: f64, flux: f64) {
        self.x.push(x);
        self.y.push(y);
        self.flux.push(flux);
    }

    pub fn set_photon(&mut self, i: usize, x: f64, y: f64, flux: f64) {
        self.x[i] = x;
        self.y[i] = y;
        self.flux[i] = flux;
    }

    pub fn is_correlated(&self) -> bool {
        self.is_correlated
    }

    pub fn set_correlated(&mut self, correlated: bool) {
        self.is_correlated = correlated;
    }

    pub fn total_flux(&self) -> f64 {
        self.flux.iter().sum()
    }

    /// Rescale all fluxes so they sum to `flux`; no-op on a zero-flux array.
    pub fn set_total_flux(&mut self, flux: f64) {
        let current = self.total_flux();
        if current != 0.0 {
            self.scale_flux(flux / current);
        }
    }

    pub fn scale_flux(&mut self, factor: f64) {
        self.flux.iter_mut().for_each(|f| *f *= factor);
    }

    pub fn scale_xy(&mut self, factor: f64) {
        self.x.iter_mut().for_each(|v| *v *= factor);
        self.y.iter_mut().for_each(|v| *v *= factor);
    }

    pub fn shift(&mut self, dx: f64, dy: f64) {
        self.x.iter_mut().for_each(|v| *v += dx);
        self.y.iter_mut().for_each(|v| *v += dy);
    }

    /// Map every position through `f(x, y) -> (x', y')`.
    pub fn map_positions<F: Fn(f64, f64) -> (f64, f64)>(&mut self, f: F) {
        for (x, y) in self.x.iter_mut().zip(self.y.iter_mut()) {
            let (nx, ny) = f(*x, *y);
            *x = nx;
            *y = ny;
        }
    }

    /// Concatenate `other` after the photons already present.
    pub fn append(&mut self, other: &PhotonArray) {
        self.x.extend_from_slice(&other.x);
        self.y.extend_from_slice(&other.y);
        self.flux.extend_from_slice(&other.flux);
    }

    /// Convolve with another array of the same length.
    ///
    /// Positions add and fluxes multiply (times `N`, so two arrays of total
    /// flux `F1` and `F2` give `F1 * F2`). When both arrays are correlated
    /// the pairing is randomised with a Fisher-Yates pass over `self`.
    pub fn convolve(&mut self, rhs: &PhotonArray, rng: &mut BaseDeviate) -> Result<()> {
        let n = self.len();
        if rhs.len() != n {
            return Err(ProfileError::invalid(
                "photons",
                format!("cannot convolve arrays of {} and {} photons", n, rhs.len()),
            ));
        }
        let nf = n as f64;
        if self.is_correlated && rhs.is_correlated {
            for i_out in (0..n).rev() {
                let i_in = ((i_out + 1) as f64 * rng.uniform()) as usize;
                let i_in = i_in.min(i_out);
                self.x.swap(i_in, i_out);
                self.y.swap(i_in, i_out);
                self.flux.swap(i_in, i_out);
                self.x[i_out] += rhs.x[i_out];
                self.y[i_out] += rhs.y[i_out];
                self.flux[i_out] *= rhs.flux[i_out] * nf;
            }
        } else {
            for i in 0..n {
                self.x[i] += rhs.x[i];
                self.y[i] += rhs.y[i];
                self.flux[i] *= rhs.flux[i] * nf;
            }
            if rhs.is_correlated {
                self.is_correlated = true;
            }
        }
        Ok(())
    }

    /// Deposit every photon into the pixel whose center is nearest.
    ///
    /// Positions must already be in the image's pixel coordinates. Photons
    /// landing outside the bounds, or at a non-finite position, are dropped.
    /// Returns the flux that landed.
    pub fn add_to<T: Pixel>(&self, image: &mut ImageViewMut<'_, T>) -> f64 {
        let mut added = 0.0;
        for ((&x, &y), &flux) in self.x.iter().zip(&self.y).zip(&self.flux) {
            let Some((ix, iy)) = nearest_pixel(x, y) else {
                continue;
            };
            if image.accumulate(ix, iy, flux) {
                added += flux;
            }
        }
        added
    }
}
