//! Photon-shooting renderer.
//!
//! Photons land on the nearest pixel center (`floor(p + 0.5)` in pixel
//! coordinates) unless a [`Sensor`] is given; photons outside the image
//! are lost and not counted in the added flux.

use log::debug;
use nalgebra::Vector2;

use super::{check_offset, commit, DrawReport, Normalization, Placement};
use crate::error::{ProfileError, Result};
use crate::image::{Image, ImageD, Pixel};
use crate::photon::Sensor;
use crate::profile::Profile;
use crate::random::{BaseDeviate, PoissonDeviate};

#[derive(Debug, Clone, PartialEq)]
pub struct ShootOptions {
    /// Number of photons; `None` uses `|flux|` rounded (at least one).
    pub n_photons: Option<usize>,
    /// Draw the photon count from a Poisson distribution and scale the flux
    /// with it. `None` means "only when `n_photons` was not given".
    pub poisson_flux: Option<bool>,
    pub normalization: Normalization,
    pub offset: Vector2<f64>,
    pub add_to_image: bool,
    /// Charge collection model; `None` deposits each photon in the pixel
    /// whose center is nearest.
    pub sensor: Option<Sensor>,
}

impl Default for ShootOptions {
    fn default() -> Self {
        Self {
            n_photons: None,
            poisson_flux: None,
            normalization: Normalization::Flux,
            offset: Vector2::zeros(),
            add_to_image: false,
            sensor: None,
        }
    }
}

/// Photons needed for relative flux accuracy `accuracy` in the brightest
/// pixel, which holds `peak` of `total` flux.
pub fn photons_for_accuracy(peak: f64, total: f64, accuracy: f64) -> Result<usize> {
    for (name, v) in [("peak", peak), ("total", total), ("accuracy", accuracy)] {
        if !(v.is_finite() && v > 0.0) {
            return Err(ProfileError::invalid(name, format!("must be positive, got {v}")));
        }
    }
    Ok((total.abs() / (peak.abs() * accuracy * accuracy)).ceil() as usize)
}

/// Shoot photons from `profile` onto `image`.
pub fn draw_shoot<T: Pixel>(
    profile: &Profile,
    image: &mut Image<T>,
    opts: &ShootOptions,
    rng: &mut BaseDeviate,
) -> Result<DrawReport> {
    check_offset(&opts.offset)?;
    let bounds = image.bounds();
    if !bounds.is_defined() {
        return Err(ProfileError::invalid("image", "cannot draw onto undefined bounds"));
    }
    let scale = image.scale();
    let gsparams = profile.gsparams();
    let mut report = DrawReport::default();
    if profile.contains_box() {
        report.warn(format!(
            "{} tree contains a Box; photon shooting already integrates over pixels",
            profile.kind()
        ));
    }

    let flux = profile.flux();
    let nominal = opts.n_photons.unwrap_or_else(|| (flux.abs().round() as usize).max(1));
    let poisson = opts.poisson_flux.unwrap_or(opts.n_photons.is_none());
    let n = if poisson {
        PoissonDeviate::new(nominal as f64)?.sample(rng) as usize
    } else {
        nominal
    };
    debug!("shooting {n} photons (nominal {nominal}) from {}", profile.kind());

    let mut photons = profile.shoot(n, rng)?;
    if poisson && nominal > 0 {
        photons.scale_flux(n as f64 / nominal as f64);
    }
    report.photons = n;
    report.shot_flux = photons.total_flux();

    let placement = Placement::new(&bounds, &opts.offset);
    let center = Vector2::new(
        placement.pixel.0 as f64 + placement.frac.x,
        placement.pixel.1 as f64 + placement.frac.y,
    );
    photons.map_positions(|x, y| (x / scale + center.x, y / scale + center.y));

    let mut scratch = ImageD::new(bounds, scale)?;
    report.added_flux = match &opts.sensor {
        Some(sensor) => sensor.accumulate(&photons, &mut scratch.view_mut(), rng)?,
        None => photons.add_to(&mut scratch.view_mut()),
    };
    let report = report.finish(gsparams)?;

    let factor = match opts.normalization {
        Normalization::Flux => 1.0,
        Normalization::SurfaceBrightness => 1.0 / (scale * scale),
    };
    commit(image, scratch.array(), factor, opts.add_to_image);
    Ok(report)
}
