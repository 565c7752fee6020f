//! Invariants every profile must satisfy.

mod common;

use std::f64::consts::PI;

use approx::{assert_abs_diff_eq, assert_relative_eq};
use nalgebra::{Matrix2, Vector2};
use profile_math::{bessel_j0, integrate, integrate_panels};
use sbprofile::image::ImageD;
use sbprofile::profile::{BoxProfile, Convolution, Gaussian, InterpolatedImage, Interpolant, Profile, Sum};
use sbprofile::render::{draw, DrawOptions, Method};
use sbprofile::{AffineTransform, Distortion, Shear};

use common::{enclosed_flux, init_logging, max_abs_diff, radial_zoo};

/// `2π ∫₀^R r I(r) J0(k r) dr` of an axisymmetric profile, taken from its
/// real-space values along +x.
fn hankel_of_xval(profile: &Profile, k: f64, r_max: f64) -> f64 {
    let mut edges = vec![0.0];
    let mut e = 1e-7;
    while e < 0.25 {
        edges.push(e);
        e *= 4.0;
    }
    let mut e = 0.25;
    while e < r_max {
        edges.push(e);
        e += 0.25;
    }
    edges.push(r_max);
    let f = |r: f64| r * profile.xval(&Vector2::new(r, 0.0)) * bessel_j0(k * r);
    2.0 * PI * integrate_panels(f, &edges, 1e-10, 1e-13).value
}

#[test]
fn test_dc_value_is_flux() {
    init_logging();
    for flux in [1.0, 17.5, -2.0] {
        for p in radial_zoo(0.9, flux) {
            let dc = p.k_value(0.0, 0.0).unwrap();
            assert_relative_eq!(dc.re, flux, max_relative = 1e-9);
            assert!(dc.im.abs() < 1e-12 * flux.abs(), "{}", p.kind());
        }
        let pix: Profile = BoxProfile::new(0.4, 0.7, flux).unwrap().into();
        assert_relative_eq!(pix.k_value(0.0, 0.0).unwrap().re, flux, max_relative = 1e-12);
    }
}

#[test]
fn test_dc_value_is_flux_for_interpolated_image() {
    let mut img = ImageD::from_size(11, 11, 0.3).unwrap();
    for y in 1..=11 {
        for x in 1..=11 {
            let r2 = ((x - 6) * (x - 6) + (y - 6) * (y - 6)) as f64;
            img.set(x, y, (-r2 / 6.0).exp()).unwrap();
        }
    }
    for kernel in [Interpolant::Nearest, Interpolant::Linear, Interpolant::Cubic] {
        let p: Profile = InterpolatedImage::new(&img, kernel).unwrap().into();
        assert_relative_eq!(p.k_value(0.0, 0.0).unwrap().re, img.sum(), max_relative = 1e-9);
        assert_relative_eq!(p.flux(), img.sum(), max_relative = 1e-12);
    }
}

#[test]
fn test_k_value_is_the_transform_of_x_value() {
    init_logging();
    for p in radial_zoo(1.0, 1.0) {
        for k in [0.3, 1.0, 2.5] {
            let direct = hankel_of_xval(&p, k, 300.0);
            let tabulated = p.kval(&Vector2::new(k, 0.0));
            assert_abs_diff_eq!(tabulated.re, direct, epsilon = 1e-4);
            assert!(tabulated.im.abs() < 1e-12, "{} at k = {k}", p.kind());
        }
    }
}

#[test]
fn test_box_k_value_is_the_transform_of_x_value() {
    let (w, h) = (0.6, 1.1);
    let pix: Profile = BoxProfile::new(w, h, 2.0).unwrap().into();
    for (kx, ky) in [(0.0, 3.0), (2.0, 1.0), (7.0, -4.0)] {
        let column = |x: f64| {
            let f = |y: f64| pix.xval(&Vector2::new(x, y)) * (ky * y).cos();
            integrate(f, -0.5 * h, 0.5 * h, 1e-11, 1e-14).value * (kx * x).cos()
        };
        let direct = integrate(column, -0.5 * w, 0.5 * w, 1e-10, 1e-13).value;
        let kv = pix.kval(&Vector2::new(kx, ky));
        assert_abs_diff_eq!(kv.re, direct, epsilon = 1e-8);
        assert!(kv.im.abs() < 1e-12);
    }
}

#[test]
fn test_half_light_radius_encloses_half_the_flux() {
    init_logging();
    for size in [0.4, 1.0, 2.7] {
        for p in radial_zoo(size, 3.0) {
            let hlr = p.half_light_radius().unwrap();
            let half = enclosed_flux(&p, hlr);
            assert_relative_eq!(half, 1.5, max_relative = 1e-4);
        }
    }
}

#[test]
fn test_transforms_move_sampling_scales() {
    let g: Profile = Gaussian::with_sigma(1.0, 1.0).unwrap().into();
    let big = g.dilate(3.0).unwrap();
    assert_relative_eq!(big.step_k(), g.step_k() / 3.0, max_relative = 1e-12);
    assert_relative_eq!(big.max_k(), g.max_k() / 3.0, max_relative = 1e-12);
    let moved = g.shift(1.5, -2.0).unwrap();
    assert_relative_eq!(moved.centroid(), Vector2::new(1.5, -2.0));
    assert!(moved.step_k() < g.step_k());
}

#[test]
fn test_transform_then_inverse_is_identity() {
    let base: Profile = Sum::new(vec![
        Gaussian::with_sigma(0.7, 2.0).unwrap().into(),
        Profile::from(Gaussian::with_sigma(1.4, 1.0).unwrap()).shift(0.3, 0.1).unwrap(),
    ])
    .unwrap()
    .into();
    let t = AffineTransform::new(Matrix2::new(1.2, 0.3, -0.1, 0.7), Vector2::new(0.4, -0.6), 2.5).unwrap();
    let back = base.transform(&t).unwrap().transform(&t.inverse().unwrap()).unwrap();
    for (x, y) in [(0.0, 0.0), (0.5, -0.3), (-1.2, 0.8)] {
        assert_relative_eq!(back.x_value(x, y).unwrap(), base.x_value(x, y).unwrap(), max_relative = 1e-10);
        let kb = back.k_value(x, y).unwrap();
        let k0 = base.k_value(x, y).unwrap();
        assert!((kb - k0).norm() < 1e-10);
    }
}

#[test]
fn test_transform_round_trip_renders_the_same_image() {
    let base: Profile = Sum::new(vec![
        Gaussian::with_sigma(0.5, 2.0).unwrap().into(),
        Profile::from(Gaussian::with_sigma(0.9, 1.0).unwrap()).shift(0.2, -0.1).unwrap(),
    ])
    .unwrap()
    .into();
    let t = AffineTransform::new(Matrix2::new(0.9, 0.25, -0.15, 1.3), Vector2::new(-0.3, 0.5), 0.8).unwrap();
    let back = base.transform(&t).unwrap().transform(&t.inverse().unwrap()).unwrap();
    assert_relative_eq!(back.flux(), base.flux(), max_relative = 1e-12);

    for method in [Method::RealSpace, Method::Fft] {
        let opts = DrawOptions {
            method,
            ..DrawOptions::default()
        };
        let mut expected = ImageD::from_size(32, 32, 0.2).unwrap();
        draw(&base, &mut expected, &opts).unwrap();
        let mut got = expected.clone();
        draw(&back, &mut got, &opts).unwrap();
        assert!(
            max_abs_diff(&expected, &got) <= 1e-5 * expected.max(),
            "{method:?}: {}",
            max_abs_diff(&expected, &got)
        );
    }
}

#[test]
fn test_distortion_applies_in_order() {
    let g: Profile = Gaussian::with_sigma(1.0, 1.0).unwrap().into();
    let d = Distortion {
        rotation: 0.4,
        shear: Some(Shear::new(0.1, 0.05).unwrap()),
        shift: Vector2::new(0.2, 0.0),
        magnification: 1.2,
        ..Distortion::default()
    };
    let once = g.distort(&d).unwrap();
    let stepwise = g
        .rotate(0.4)
        .unwrap()
        .shear(&Shear::new(0.1, 0.05).unwrap())
        .unwrap()
        .shift(0.2, 0.0)
        .unwrap()
        .magnify(1.2)
        .unwrap();
    assert_relative_eq!(once.flux(), 1.2, max_relative = 1e-12);
    for (x, y) in [(0.1, 0.2), (1.0, -0.5)] {
        assert_relative_eq!(once.x_value(x, y).unwrap(), stepwise.x_value(x, y).unwrap(), max_relative = 1e-12);
    }
}

#[test]
fn test_convolution_flux_is_product() {
    let a: Profile = Gaussian::with_sigma(0.5, 3.0).unwrap().into();
    let b: Profile = BoxProfile::pixel(0.2, 0.5).unwrap().into();
    let c: Profile = Convolution::new(vec![a, b], None).unwrap().into();
    assert_relative_eq!(c.flux(), 1.5);
    assert_relative_eq!(c.k_value(0.0, 0.0).unwrap().re, 1.5, max_relative = 1e-14);
}
