//! Charge collection in a thick sensor.
//!
//! A [`Sensor`] replaces the plain nearest-pixel deposit of
//! [`PhotonArray::add_to`] with two effects, both measured in pixels:
//!
//! - lateral diffusion: each photon is displaced by a Gaussian of width
//!   `diffusion` before it is assigned to a pixel;
//! - brighter-fatter: the boundary between two neighboring pixels moves
//!   toward the one holding more charge by `strength` times the charge
//!   difference, so bright pixels shrink as they fill.
//!
//! Boundaries are evaluated against the charge collected so far, photon by
//! photon, which makes the result depend on photon order.

use log::trace;

use super::PhotonArray;
use crate::error::{ProfileError, Result};
use crate::image::{ImageViewMut, Pixel};
use crate::random::{BaseDeviate, GaussianDeviate};

/// Largest boundary displacement, in pixels. Keeps every pixel's edges
/// ordered however much charge has piled up.
pub const MAX_BOUNDARY_SHIFT: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sensor {
    diffusion: f64,
    strength: f64,
}

impl Default for Sensor {
    fn default() -> Self {
        Self::ideal()
    }
}

impl Sensor {
    /// `diffusion` is the Gaussian sigma in pixels, `strength` the boundary
    /// shift in pixels per unit of flux difference between neighbors.
    pub fn new(diffusion: f64, strength: f64) -> Result<Self> {
        for (name, v) in [("diffusion", diffusion), ("strength", strength)] {
            if !(v.is_finite() && v >= 0.0) {
                return Err(ProfileError::invalid(name, format!("must be finite and >= 0, got {v}")));
            }
        }
        Ok(Self { diffusion, strength })
    }

    /// No diffusion and fixed pixel boundaries; equivalent to `add_to`.
    pub fn ideal() -> Self {
        Self {
            diffusion: 0.0,
            strength: 0.0,
        }
    }

    pub fn diffusion(&self) -> f64 {
        self.diffusion
    }

    pub fn strength(&self) -> f64 {
        self.strength
    }

    /// Collect `photons` (already in pixel coordinates) into `image`.
    ///
    /// Returns the flux that landed inside the bounds. Photons with a
    /// non-finite position are dropped.
    pub fn accumulate<T: Pixel>(
        &self,
        photons: &PhotonArray,
        image: &mut ImageViewMut<'_, T>,
        rng: &mut BaseDeviate,
    ) -> Result<f64> {
        let diffuse = if self.diffusion > 0.0 {
            Some(GaussianDeviate::new(0.0, self.diffusion)?)
        } else {
            None
        };
        trace!(
            "collecting {} photons, diffusion {} px, strength {}",
            photons.len(),
            self.diffusion,
            self.strength
        );

        let mut added = 0.0;
        for ((&x, &y), &flux) in photons.x().iter().zip(photons.y()).zip(photons.flux()) {
            if !(x.is_finite() && y.is_finite()) {
                continue;
            }
            let (x, y) = match &diffuse {
                Some(g) => (x + g.sample(rng), y + g.sample(rng)),
                None => (x, y),
            };
            let Some((ix, iy)) = nearest_pixel(x, y) else {
                continue;
            };
            let (ix, iy) = if self.strength > 0.0 {
                self.reassign(image, ix, iy, x - ix as f64, y - iy as f64)
            } else {
                (ix, iy)
            };
            if image.accumulate(ix, iy, flux) {
                added += flux;
            }
        }
        Ok(added)
    }

    /// Move a photon at offset `(u, v)` from the center of `(ix, iy)` into a
    /// neighbor when the charge-shifted boundaries exclude it.
    fn reassign<T: Pixel>(&self, image: &ImageViewMut<'_, T>, ix: i32, iy: i32, u: f64, v: f64) -> (i32, i32) {
        let Ok(q0) = image.get(ix, iy) else {
            return (ix, iy);
        };
        let q0 = q0.to_f64();
        // a neighbor outside the image exerts no net push
        let charge = |x: i32, y: i32| image.get(x, y).map(|q| q.to_f64()).unwrap_or(q0);
        let shift = |q: f64| (self.strength * (q0 - q)).clamp(-MAX_BOUNDARY_SHIFT, MAX_BOUNDARY_SHIFT);

        let ix = if u >= 0.5 - shift(charge(ix + 1, iy)) {
            ix + 1
        } else if u < -0.5 + shift(charge(ix - 1, iy)) {
            ix - 1
        } else {
            ix
        };
        let iy = if v >= 0.5 - shift(charge(ix, iy + 1)) {
            iy + 1
        } else if v < -0.5 + shift(charge(ix, iy - 1)) {
            iy - 1
        } else {
            iy
        };
        (ix, iy)
    }
}

/// Pixel whose center is nearest `(x, y)`, or `None` when that lies
/// outside the `i32` grid.
pub(crate) fn nearest_pixel(x: f64, y: f64) -> Option<(i32, i32)> {
    let ix = (x + 0.5).floor();
    let iy = (y + 0.5).floor();
    let range = i32::MIN as f64..=i32::MAX as f64;
    (range.contains(&ix) && range.contains(&iy)).then_some((ix as i32, iy as i32))
}
