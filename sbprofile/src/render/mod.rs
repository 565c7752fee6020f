//! Turning profiles into pixels.
//!
//! Three paths share one coordinate convention: the profile origin lands on
//! the image's true center plus `offset` (in pixels), and pixel `(ix, iy)`
//! samples the world point `((ix, iy) - center - offset) * scale`.
//!
//! - [`Method::RealSpace`] samples `x_value` at pixel centers.
//! - [`Method::Fft`] fills a Fourier grid from `k_value` and inverse
//!   transforms it.
//! - [`draw_shoot`] deposits photons, which already integrates over the
//!   pixel area. Never shoot a tree that contains a pixel response.
//!
//! Neither of the first two paths adds a pixel response: convolve with a
//! [`BoxProfile`](crate::profile::BoxProfile) first to get pixel-integrated
//! values.
//!
//! Values are computed into a scratch buffer and committed at the end, so a
//! failed draw leaves the target untouched.

mod direct;
mod fft;
mod shoot;

pub use fft::good_fft_size;
pub use shoot::{draw_shoot, photons_for_accuracy, ShootOptions};

use std::f64::consts::PI;

use log::{debug, warn};
use nalgebra::Vector2;
use ndarray::Array2;

use crate::error::{ProfileError, Result};
use crate::image::{Bounds, Image, ImageD, Pixel};
use crate::params::GsParams;
use crate::profile::Profile;

/// Meaning of a drawn pixel value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Normalization {
    /// Flux falling in the pixel: surface brightness times pixel area.
    #[default]
    Flux,
    /// Surface brightness at the pixel center; smaller by `scale²`.
    SurfaceBrightness,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    /// Real space when the tree is analytic in x, otherwise FFT.
    #[default]
    Auto,
    Fft,
    RealSpace,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawOptions {
    /// Pixel scale; `None` keeps the image's own (or, for
    /// [`draw_new`], the Nyquist scale `π / maxK`).
    pub scale: Option<f64>,
    pub normalization: Normalization,
    /// Multiplies the size of fresh images and FFT grids.
    pub wmult: f64,
    /// Shift of the profile origin from the image center, in pixels.
    pub offset: Vector2<f64>,
    /// Add to existing pixel values instead of overwriting them.
    pub add_to_image: bool,
    pub method: Method,
}

impl Default for DrawOptions {
    fn default() -> Self {
        Self {
            scale: None,
            normalization: Normalization::Flux,
            wmult: 1.0,
            offset: Vector2::zeros(),
            add_to_image: false,
            method: Method::Auto,
        }
    }
}

/// Outcome of a draw.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrawReport {
    /// Flux that landed on the image (in flux units whatever the
    /// normalization).
    pub added_flux: f64,
    /// Total flux of all photons shot, after any Poisson draw on their
    /// number. Zero for the deterministic paths.
    pub shot_flux: f64,
    pub photons: usize,
    pub warnings: Vec<String>,
}

impl DrawReport {
    fn warn(&mut self, message: String) {
        warn!("{message}");
        self.warnings.push(message);
    }

    /// In strict mode any recorded shortfall becomes an error.
    fn finish(self, gsparams: &GsParams) -> Result<Self> {
        if gsparams.strict && !self.warnings.is_empty() {
            return Err(ProfileError::AccuracyShortfall(self.warnings.join("; ")));
        }
        Ok(self)
    }
}

/// Where the profile origin falls, split into an integer pixel and a
/// fractional remainder in `[0, 1)`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Placement {
    pub(crate) pixel: (i64, i64),
    pub(crate) frac: Vector2<f64>,
}

impl Placement {
    pub(crate) fn new(bounds: &Bounds, offset: &Vector2<f64>) -> Self {
        let c = bounds.true_center() + offset;
        let (fx, fy) = (c.x.floor(), c.y.floor());
        Self {
            pixel: (fx as i64, fy as i64),
            frac: Vector2::new(c.x - fx, c.y - fy),
        }
    }

    /// World position of the center of pixel `(ix, iy)`.
    pub(crate) fn world(&self, ix: i32, iy: i32, scale: f64) -> Vector2<f64> {
        Vector2::new(
            (ix as i64 - self.pixel.0) as f64 - self.frac.x,
            (iy as i64 - self.pixel.1) as f64 - self.frac.y,
        ) * scale
    }
}

fn check_offset(offset: &Vector2<f64>) -> Result<()> {
    if offset.x.is_finite() && offset.y.is_finite() {
        Ok(())
    } else {
        Err(ProfileError::invalid("offset", "must be finite"))
    }
}

/// Draw `profile` onto `image`.
pub fn draw<T: Pixel>(profile: &Profile, image: &mut Image<T>, opts: &DrawOptions) -> Result<DrawReport> {
    check_offset(&opts.offset)?;
    if !(opts.wmult.is_finite() && opts.wmult > 0.0) {
        return Err(ProfileError::invalid("wmult", "must be positive"));
    }
    if let Some(scale) = opts.scale {
        image.set_scale(scale)?;
    }
    let scale = image.scale();
    let bounds = image.bounds();
    if !bounds.is_defined() {
        return Err(ProfileError::invalid("image", "cannot draw onto undefined bounds"));
    }
    let gsparams = profile.gsparams();
    let mut report = DrawReport::default();

    let use_fft = match opts.method {
        Method::Fft => true,
        Method::RealSpace => {
            if !profile.is_analytic_x() {
                return Err(ProfileError::invalid(
                    "method",
                    format!("a {} profile has no analytic real-space values", profile.kind()),
                ));
            }
            false
        }
        Method::Auto => !profile.is_analytic_x(),
    };

    let placement = Placement::new(&bounds, &opts.offset);
    let sb = if use_fft {
        fft::render(profile, &bounds, scale, &placement, opts.wmult, &mut report)?
    } else {
        direct::render(profile, &bounds, scale, &placement)
    };

    let area = scale * scale;
    report.added_flux = sb.sum() * area;
    let flux = profile.flux();
    let lost = (flux - report.added_flux).abs();
    if flux != 0.0 && lost > 2.0 * gsparams.folding_threshold * flux.abs() {
        report.warn(format!(
            "image {} captures {:.5} of flux {:.5}; it may be too small for this profile",
            bounds, report.added_flux, flux
        ));
    }
    debug!(
        "drew {} on {} with {}, flux {:.6}",
        profile.kind(),
        bounds,
        if use_fft { "FFT" } else { "real-space sampling" },
        report.added_flux
    );
    let report = report.finish(gsparams)?;

    let factor = match opts.normalization {
        Normalization::Flux => area,
        Normalization::SurfaceBrightness => 1.0,
    };
    commit(image, &sb, factor, opts.add_to_image);
    Ok(report)
}

/// Draw onto a fresh square image sized to hold the profile.
///
/// The side is `wmult * 2π / (stepK * scale)` rounded up to an even
/// number of pixels.
pub fn draw_new(profile: &Profile, opts: &DrawOptions) -> Result<(ImageD, DrawReport)> {
    let scale = match opts.scale {
        Some(s) => s,
        None => PI / profile.max_k(),
    };
    let mut n = (opts.wmult * 2.0 * PI / (profile.step_k() * scale)).ceil() as usize;
    n = n.max(2);
    if n % 2 == 1 {
        n += 1;
    }
    let mut image = ImageD::new(Bounds::from_size(n, n), scale)?;
    let opts = DrawOptions {
        scale: Some(scale),
        add_to_image: false,
        ..opts.clone()
    };
    let report = draw(profile, &mut image, &opts)?;
    Ok((image, report))
}

/// Write (or add) `values * factor` into `image`.
pub(crate) fn commit<T: Pixel>(image: &mut Image<T>, values: &Array2<f64>, factor: f64, add: bool) {
    for (px, v) in image.array_mut().iter_mut().zip(values.iter()) {
        let v = v * factor;
        *px = if add { T::from_f64(px.to_f64() + v) } else { T::from_f64(v) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{BoxProfile, Convolution, Gaussian};
    use approx::assert_relative_eq;

    fn gaussian() -> Profile {
        Gaussian::with_sigma(1.0, 1.0).unwrap().into()
    }

    #[test]
    fn test_placement_even_and_odd() {
        let odd = Placement::new(&Bounds::from_size(5, 5), &Vector2::zeros());
        assert_eq!(odd.pixel, (3, 3));
        assert_eq!(odd.world(3, 3, 0.5), Vector2::zeros());
        let even = Placement::new(&Bounds::from_size(4, 4), &Vector2::new(0.25, 0.0));
        assert_eq!(even.pixel, (2, 2));
        assert_relative_eq!(even.world(3, 2, 1.0), Vector2::new(0.25, -0.5));
    }

    #[test]
    fn test_normalizations_differ_by_area() {
        let mut flux_img = ImageD::from_size(16, 16, 0.25).unwrap();
        let mut sb_img = flux_img.clone();
        draw(&gaussian(), &mut flux_img, &DrawOptions::default()).unwrap();
        let sb_opts = DrawOptions {
            normalization: Normalization::SurfaceBrightness,
            ..DrawOptions::default()
        };
        draw(&gaussian(), &mut sb_img, &sb_opts).unwrap();
        let ratio = flux_img.get(8, 9).unwrap() / sb_img.get(8, 9).unwrap();
        assert_relative_eq!(ratio, 0.0625, epsilon = 1e-15);
    }

    #[test]
    fn test_add_to_image_accumulates() {
        let mut img = ImageD::from_size(20, 20, 0.3).unwrap();
        let opts = DrawOptions::default();
        draw(&gaussian(), &mut img, &opts).unwrap();
        let once = img.sum();
        draw(&gaussian(), &mut img, &DrawOptions { add_to_image: true, ..opts }).unwrap();
        assert_relative_eq!(img.sum(), 2.0 * once, epsilon = 1e-12);
    }

    #[test]
    fn test_small_image_warns_and_strict_fails() {
        let mut img = ImageD::from_size(4, 4, 0.2).unwrap();
        let report = draw(&gaussian(), &mut img, &DrawOptions::default()).unwrap();
        assert_eq!(report.warnings.len(), 1);

        let strict = GsParams {
            strict: true,
            ..GsParams::default()
        };
        let g: Profile = Gaussian::with_sigma(1.0, 1.0).unwrap().with_gsparams(strict).unwrap().into();
        let before = img.clone();
        let err = draw(&g, &mut img, &DrawOptions::default()).unwrap_err();
        assert!(matches!(err, ProfileError::AccuracyShortfall(_)));
        assert_eq!(img, before);
    }

    #[test]
    fn test_real_space_request_needs_analytic_tree() {
        let pix: Profile = BoxProfile::pixel(0.2, 1.0).unwrap().into();
        let conv: Profile = Convolution::new(vec![gaussian(), pix.clone(), pix], None).unwrap().into();
        let mut img = ImageD::from_size(8, 8, 0.2).unwrap();
        let opts = DrawOptions {
            method: Method::RealSpace,
            ..DrawOptions::default()
        };
        assert!(draw(&conv, &mut img, &opts).is_err());
    }

    #[test]
    fn test_draw_new_sizes_from_step_k() {
        let (img, report) = draw_new(&gaussian(), &DrawOptions::default()).unwrap();
        assert_eq!(img.bounds().ncol() % 2, 0);
        assert_relative_eq!(img.scale(), PI / gaussian().max_k());
        assert_relative_eq!(report.added_flux, 1.0, epsilon = 1e-3);
        assert!(report.warnings.is_empty());
    }
}
