//! Noise models applied to rendered images.
//!
//! Every model perturbs pixels in row-major order (y outer, x inner) using
//! one borrowed [`BaseDeviate`], so the same seed and the same image size
//! always produce the same realization.
//!
//! - [`GaussianNoise`]: additive, signal independent
//! - [`PoissonNoise`]: shot noise on `signal + sky`, sky subtracted again
//! - [`CcdNoise`]: shot noise in electrons through a gain, plus read noise

use rand_distr::{Distribution, Normal, Poisson};

use super::buffer::{ImageViewMut, Pixel};
use crate::error::{require_finite, ProfileError, Result};
use crate::random::BaseDeviate;

/// Perturbs the pixels of an image in place.
pub trait NoiseModel {
    fn apply<T: Pixel>(&self, image: &mut ImageViewMut<'_, T>, rng: &mut BaseDeviate) -> Result<()>;

    /// Per-pixel variance this model adds to an empty (zero) image.
    fn variance(&self) -> f64;
}

fn require_non_negative(name: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ProfileError::invalid(name, format!("must be finite and >= 0, got {value}")))
    }
}

/// Draw a Poisson count with the given mean; non-positive means give zero.
fn poisson_count(mean: f64, rng: &mut BaseDeviate) -> f64 {
    if mean > 0.0 {
        // mean is finite and positive here
        Poisson::new(mean)
            .expect("Poisson parameter must be valid (mean > 0)")
            .sample(rng)
    } else {
        0.0
    }
}

/// Additive zero-mean Gaussian noise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianNoise {
    sigma: f64,
}

impl GaussianNoise {
    pub fn new(sigma: f64) -> Result<Self> {
        Ok(Self {
            sigma: require_non_negative("sigma", sigma)?,
        })
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }
}

impl NoiseModel for GaussianNoise {
    fn apply<T: Pixel>(&self, image: &mut ImageViewMut<'_, T>, rng: &mut BaseDeviate) -> Result<()> {
        if self.sigma == 0.0 {
            return Ok(());
        }
        let normal = Normal::new(0.0, self.sigma).map_err(|e| ProfileError::invalid("sigma", e.to_string()))?;
        image.array_mut().iter_mut().for_each(|pixel| {
            *pixel = T::from_f64(pixel.to_f64() + normal.sample(rng));
        });
        Ok(())
    }

    fn variance(&self) -> f64 {
        self.sigma * self.sigma
    }
}

/// Poisson shot noise on top of a flat sky.
///
/// Each pixel becomes `Poisson(value + sky_level) - sky_level`, so the sky
/// contributes variance but not signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoissonNoise {
    sky_level: f64,
}

impl PoissonNoise {
    pub fn new(sky_level: f64) -> Result<Self> {
        Ok(Self {
            sky_level: require_non_negative("sky_level", sky_level)?,
        })
    }

    pub fn sky_level(&self) -> f64 {
        self.sky_level
    }
}

impl NoiseModel for PoissonNoise {
    fn apply<T: Pixel>(&self, image: &mut ImageViewMut<'_, T>, rng: &mut BaseDeviate) -> Result<()> {
        let sky = self.sky_level;
        image.array_mut().iter_mut().for_each(|pixel| {
            let count = poisson_count(pixel.to_f64() + sky, rng);
            *pixel = T::from_f64(count - sky);
        });
        Ok(())
    }

    fn variance(&self) -> f64 {
        self.sky_level
    }
}

/// CCD model: pixel values in ADU, `gain` electrons per ADU.
///
/// Shot noise is drawn on `(value + sky) * gain` electrons, Gaussian read
/// noise of `read_noise` electrons is added, and the result is converted
/// back to ADU with the sky removed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CcdNoise {
    sky_level: f64,
    gain: f64,
    read_noise: f64,
}

impl CcdNoise {
    pub fn new(sky_level: f64, gain: f64, read_noise: f64) -> Result<Self> {
        Ok(Self {
            sky_level: require_non_negative("sky_level", sky_level)?,
            gain: require_non_negative("gain", gain)?,
            read_noise: require_non_negative("read_noise", read_noise)?,
        })
    }

    pub fn sky_level(&self) -> f64 {
        self.sky_level
    }

    pub fn gain(&self) -> f64 {
        self.gain
    }

    pub fn read_noise(&self) -> f64 {
        self.read_noise
    }
}

impl NoiseModel for CcdNoise {
    fn apply<T: Pixel>(&self, image: &mut ImageViewMut<'_, T>, rng: &mut BaseDeviate) -> Result<()> {
        let sky = self.sky_level;
        // gain == 0 means no shot noise; read noise is then quoted in ADU
        let read = if self.read_noise > 0.0 {
            Some(Normal::new(0.0, self.read_noise).map_err(|e| ProfileError::invalid("read_noise", e.to_string()))?)
        } else {
            None
        };
        let gain = self.gain;
        image.array_mut().iter_mut().for_each(|pixel| {
            let total = pixel.to_f64() + sky;
            let mut value = if gain > 0.0 {
                poisson_count(total * gain, rng) / gain
            } else {
                total
            };
            if let Some(read) = &read {
                let scale = if gain > 0.0 { 1.0 / gain } else { 1.0 };
                value += read.sample(rng) * scale;
            }
            *pixel = T::from_f64(value - sky);
        });
        Ok(())
    }

    fn variance(&self) -> f64 {
        if self.gain > 0.0 {
            self.sky_level / self.gain + (self.read_noise / self.gain).powi(2)
        } else {
            self.read_noise * self.read_noise
        }
    }
}

/// Add Gaussian noise scaled so the image reaches a target S/N.
///
/// Uses the optimal (matched filter) definition
/// `snr = sqrt(sum(I²) / variance)`; returns the variance applied.
pub fn add_noise_snr<T: Pixel>(image: &mut ImageViewMut<'_, T>, snr: f64, rng: &mut BaseDeviate) -> Result<f64> {
    require_finite("snr", snr)?;
    if snr <= 0.0 {
        return Err(ProfileError::invalid("snr", format!("must be positive, got {snr}")));
    }
    let sum_sq: f64 = image.array().iter().map(|v| v.to_f64().powi(2)).sum();
    let variance = sum_sq / (snr * snr);
    GaussianNoise::new(variance.sqrt())?.apply(image, rng)?;
    Ok(variance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::ImageD;
    use approx::assert_relative_eq;

    fn stats(img: &ImageD) -> (f64, f64) {
        let n = img.bounds().area() as f64;
        let mean = img.sum() / n;
        let var = img.array().iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
        (mean, var)
    }

    #[test]
    fn test_gaussian_noise_statistics() {
        let mut img = ImageD::from_size(100, 100, 1.0).unwrap();
        let mut rng = BaseDeviate::new(42);
        img.add_noise(&GaussianNoise::new(5.0).unwrap(), &mut rng).unwrap();
        let (mean, var) = stats(&img);
        assert_relative_eq!(mean, 0.0, epsilon = 0.2);
        assert_relative_eq!(var.sqrt(), 5.0, epsilon = 0.2);
    }

    #[test]
    fn test_same_seed_same_noise() {
        let noise = CcdNoise::new(50.0, 2.0, 3.0).unwrap();
        let mut a = ImageD::from_size(16, 16, 1.0).unwrap();
        let mut b = a.clone();
        a.add_noise(&noise, &mut BaseDeviate::new(9)).unwrap();
        b.add_noise(&noise, &mut BaseDeviate::new(9)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_poisson_noise_subtracts_sky() {
        let mut img = ImageD::from_size(100, 100, 1.0).unwrap();
        img.fill(10.0);
        let noise = PoissonNoise::new(90.0).unwrap();
        img.add_noise(&noise, &mut BaseDeviate::new(1)).unwrap();
        let (mean, var) = stats(&img);
        assert_relative_eq!(mean, 10.0, epsilon = 0.3);
        assert_relative_eq!(var, 100.0, epsilon = 5.0);
        assert_eq!(noise.variance(), 90.0);
    }

    #[test]
    fn test_ccd_noise_variance() {
        let noise = CcdNoise::new(100.0, 4.0, 8.0).unwrap();
        let mut img = ImageD::from_size(120, 120, 1.0).unwrap();
        img.add_noise(&noise, &mut BaseDeviate::new(5)).unwrap();
        let (mean, var) = stats(&img);
        // 100/4 + (8/4)^2
        assert_relative_eq!(noise.variance(), 29.0, epsilon = 1e-12);
        assert_relative_eq!(mean, 0.0, epsilon = 0.2);
        assert_relative_eq!(var, 29.0, epsilon = 1.5);
    }

    #[test]
    fn test_noise_on_sub_image_only() {
        let mut img = ImageD::from_size(10, 10, 1.0).unwrap();
        let bounds = crate::image::Bounds::new(3, 5, 3, 5);
        {
            let mut sub = img.sub_image_mut(bounds).unwrap();
            sub.add_noise(&GaussianNoise::new(1.0).unwrap(), &mut BaseDeviate::new(2)).unwrap();
        }
        assert_eq!(img.get(1, 1).unwrap(), 0.0);
        assert_ne!(img.get(4, 4).unwrap(), 0.0);
    }

    #[test]
    fn test_snr_noise() {
        let mut img = ImageD::from_size(10, 10, 1.0).unwrap();
        img.fill(1.0);
        let var = add_noise_snr(&mut img.view_mut(), 20.0, &mut BaseDeviate::new(3)).unwrap();
        assert_relative_eq!(var, 100.0 / 400.0, epsilon = 1e-12);
    }

    #[test]
    fn test_rejects_negative_parameters() {
        assert!(GaussianNoise::new(-1.0).is_err());
        assert!(PoissonNoise::new(-1.0).is_err());
        assert!(CcdNoise::new(1.0, -2.0, 0.0).is_err());
    }
}
