//! Shared helpers for the integration tests

#![allow(dead_code)]

use nalgebra::Vector2;
use profile_math::integrate_panels;
use sbprofile::image::ImageD;
use sbprofile::profile::{Airy, Exponential, Gaussian, Kolmogorov, Moffat, Profile, Sersic};

/// Route library logging to the test harness (once per binary).
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// `2π ∫₀^r s I(s) ds` along the +x axis of an axisymmetric profile.
pub fn enclosed_flux(profile: &Profile, r: f64) -> f64 {
    // geometric panels resolve central cusps
    let mut edges = vec![0.0];
    let mut e = r * 1e-6;
    while e < r {
        edges.push(e);
        e *= 2.0;
    }
    edges.push(r);
    let value = integrate_panels(
        |s| s * profile.xval(&Vector2::new(s, 0.0)),
        &edges,
        1e-10,
        1e-14,
    )
    .value;
    2.0 * std::f64::consts::PI * value
}

/// One of every axisymmetric atomic profile, with the given size knob and
/// flux.
pub fn radial_zoo(size: f64, flux: f64) -> Vec<Profile> {
    vec![
        Gaussian::with_half_light_radius(size, flux).unwrap().into(),
        Exponential::with_half_light_radius(size, flux).unwrap().into(),
        Sersic::with_half_light_radius(0.7, size, flux).unwrap().into(),
        Sersic::with_half_light_radius(2.5, size, flux).unwrap().into(),
        Sersic::de_vaucouleurs(size, flux).unwrap().into(),
        Moffat::with_half_light_radius(2.5, size, 0.0, flux).unwrap().into(),
        Moffat::with_half_light_radius(3.0, size, 4.0 * size, flux).unwrap().into(),
        Airy::new(size, 0.0, flux).unwrap().into(),
        Airy::new(size, 0.25, flux).unwrap().into(),
        Kolmogorov::with_half_light_radius(size, flux).unwrap().into(),
    ]
}

/// Largest absolute pixel difference.
pub fn max_abs_diff(a: &ImageD, b: &ImageD) -> f64 {
    assert_eq!(a.bounds(), b.bounds());
    a.array()
        .iter()
        .zip(b.array().iter())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max)
}
