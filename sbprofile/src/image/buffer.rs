//! Pixel grids with bounds and a pixel scale.
//!
//! Storage is an `ndarray::Array2` indexed `[[y - ymin, x - xmin]]`, so rows
//! are y and columns are x as everywhere else in the crate.
//!
//! # Ownership
//!
//! [`Image`] owns its pixels. [`ImageView`] and [`ImageViewMut`] borrow a
//! rectangle of some owner: writes through a mutable sub-image land in the
//! parent's storage, and the borrow checker keeps the parent untouchable
//! until the view is dropped.

use std::fmt::Debug;
use std::ops::{AddAssign, DivAssign, MulAssign, SubAssign};

use ndarray::{s, Array2, ArrayView2, ArrayViewMut2, Zip};

use super::bounds::Bounds;
use super::noise::NoiseModel;
use crate::error::{require_positive, ProfileError, Result};
use crate::random::BaseDeviate;

/// Pixel storage type (single or double precision).
pub trait Pixel: Copy + Default + Debug + PartialOrd + Send + Sync + 'static {
    fn from_f64(value: f64) -> Self;
    fn to_f64(self) -> f64;
}

impl Pixel for f32 {
    fn from_f64(value: f64) -> Self {
        value as f32
    }

    fn to_f64(self) -> f64 {
        self as f64
    }
}

impl Pixel for f64 {
    fn from_f64(value: f64) -> Self {
        value
    }

    fn to_f64(self) -> f64 {
        self
    }
}

fn check_scale(scale: f64) -> Result<f64> {
    require_positive("scale", scale)
}

fn row_col(bounds: &Bounds, x: i32, y: i32) -> Result<[usize; 2]> {
    if bounds.includes(x, y) {
        Ok([(y - bounds.ymin) as usize, (x - bounds.xmin) as usize])
    } else {
        Err(ProfileError::OutOfDomain(format!("pixel ({x}, {y}) outside {bounds}")))
    }
}

fn sub_slice_range(parent: &Bounds, sub: &Bounds) -> Result<(usize, usize, usize, usize)> {
    if !sub.is_defined() || !parent.includes_bounds(sub) {
        return Err(ProfileError::OutOfDomain(format!("sub-bounds {sub} not inside {parent}")));
    }
    let r0 = (sub.ymin - parent.ymin) as usize;
    let c0 = (sub.xmin - parent.xmin) as usize;
    Ok((r0, r0 + sub.nrow(), c0, c0 + sub.ncol()))
}

fn check_same_bounds(left: &Bounds, right: &Bounds) -> Result<()> {
    if left == right {
        Ok(())
    } else {
        Err(ProfileError::BoundsMismatch {
            left: left.to_string(),
            right: right.to_string(),
        })
    }
}

/// Owned image.
#[derive(Debug, Clone, PartialEq)]
pub struct Image<T: Pixel = f64> {
    array: Array2<T>,
    bounds: Bounds,
    scale: f64,
}

pub type ImageF = Image<f32>;
pub type ImageD = Image<f64>;

/// Read-only window onto an image.
#[derive(Debug, Clone)]
pub struct ImageView<'a, T: Pixel> {
    array: ArrayView2<'a, T>,
    bounds: Bounds,
    scale: f64,
}

/// Writable window onto an image; writes alias the owner's storage.
#[derive(Debug)]
pub struct ImageViewMut<'a, T: Pixel> {
    array: ArrayViewMut2<'a, T>,
    bounds: Bounds,
    scale: f64,
}

impl<T: Pixel> Image<T> {
    /// Zero-filled image covering `bounds`.
    pub fn new(bounds: Bounds, scale: f64) -> Result<Self> {
        if !bounds.is_defined() {
            return Err(ProfileError::invalid("bounds", "image bounds must be defined"));
        }
        Ok(Self {
            array: Array2::default((bounds.nrow(), bounds.ncol())),
            bounds,
            scale: check_scale(scale)?,
        })
    }

    /// Zero-filled `nx` by `ny` image with bounds `[1, nx] x [1, ny]`.
    pub fn from_size(nx: usize, ny: usize, scale: f64) -> Result<Self> {
        if nx == 0 || ny == 0 {
            return Err(ProfileError::invalid("size", format!("image must be non-empty, got {nx}x{ny}")));
        }
        Self::new(Bounds::from_size(nx, ny), scale)
    }

    /// Wrap an existing array (rows = y) whose first pixel is `(xmin, ymin)`.
    pub fn from_array(array: Array2<T>, xmin: i32, ymin: i32, scale: f64) -> Result<Self> {
        let (nrow, ncol) = array.dim();
        if nrow == 0 || ncol == 0 {
            return Err(ProfileError::invalid("array", "image array must be non-empty"));
        }
        Ok(Self {
            bounds: Bounds::new(xmin, xmin + ncol as i32 - 1, ymin, ymin + nrow as i32 - 1),
            array,
            scale: check_scale(scale)?,
        })
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn set_scale(&mut self, scale: f64) -> Result<()> {
        self.scale = check_scale(scale)?;
        Ok(())
    }

    pub fn array(&self) -> &Array2<T> {
        &self.array
    }

    pub fn array_mut(&mut self) -> &mut Array2<T> {
        &mut self.array
    }

    pub fn into_array(self) -> Array2<T> {
        self.array
    }

    /// Move the bounds origin without touching pixel values.
    pub fn shift_origin(&mut self, dx: i32, dy: i32) {
        self.bounds = self.bounds.shift(dx, dy);
    }

    pub fn view(&self) -> ImageView<'_, T> {
        ImageView {
            array: self.array.view(),
            bounds: self.bounds,
            scale: self.scale,
        }
    }

    pub fn view_mut(&mut self) -> ImageViewMut<'_, T> {
        ImageViewMut {
            array: self.array.view_mut(),
            bounds: self.bounds,
            scale: self.scale,
        }
    }

    pub fn sub_image(&self, bounds: Bounds) -> Result<ImageView<'_, T>> {
        let (r0, r1, c0, c1) = sub_slice_range(&self.bounds, &bounds)?;
        Ok(ImageView {
            array: self.array.slice(s![r0..r1, c0..c1]),
            bounds,
            scale: self.scale,
        })
    }

    pub fn sub_image_mut(&mut self, bounds: Bounds) -> Result<ImageViewMut<'_, T>> {
        let (r0, r1, c0, c1) = sub_slice_range(&self.bounds, &bounds)?;
        Ok(ImageViewMut {
            array: self.array.slice_mut(s![r0..r1, c0..c1]),
            bounds,
            scale: self.scale,
        })
    }

    pub fn get(&self, x: i32, y: i32) -> Result<T> {
        Ok(self.array[row_col(&self.bounds, x, y)?])
    }

    pub fn set(&mut self, x: i32, y: i32, value: T) -> Result<()> {
        self.array[row_col(&self.bounds, x, y)?] = value;
        Ok(())
    }

    pub fn fill(&mut self, value: T) {
        self.array.fill(value);
    }

    pub fn set_zero(&mut self) {
        self.array.fill(T::default());
    }

    pub fn sum(&self) -> f64 {
        self.view().sum()
    }

    pub fn max(&self) -> f64 {
        self.view().max()
    }

    /// Perturb pixel values with a noise model, drawing from `rng` in row-major order.
    pub fn add_noise<N: NoiseModel>(&mut self, noise: &N, rng: &mut BaseDeviate) -> Result<()> {
        noise.apply(&mut self.view_mut(), rng)
    }

    /// Pixelwise `self += other`; bounds must match.
    pub fn try_add_image(&mut self, other: &ImageView<'_, T>) -> Result<()> {
        self.view_mut().try_add_image(other)
    }

    /// Pixelwise `self -= other`; bounds must match.
    pub fn try_sub_image(&mut self, other: &ImageView<'_, T>) -> Result<()> {
        self.view_mut().try_sub_image(other)
    }
}

impl<'a, T: Pixel> ImageView<'a, T> {
    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn array(&self) -> &ArrayView2<'a, T> {
        &self.array
    }

    pub fn get(&self, x: i32, y: i32) -> Result<T> {
        Ok(self.array[row_col(&self.bounds, x, y)?])
    }

    pub fn sum(&self) -> f64 {
        self.array.iter().map(|v| v.to_f64()).sum()
    }

    pub fn max(&self) -> f64 {
        self.array.iter().map(|v| v.to_f64()).fold(f64::NEG_INFINITY, f64::max)
    }

    /// Copy into a new owned image with the same bounds.
    pub fn to_image(&self) -> Image<T> {
        Image {
            array: self.array.to_owned(),
            bounds: self.bounds,
            scale: self.scale,
        }
    }
}

impl<'a, T: Pixel> ImageViewMut<'a, T> {
    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn array(&self) -> ArrayView2<'_, T> {
        self.array.view()
    }

    pub fn array_mut(&mut self) -> &mut ArrayViewMut2<'a, T> {
        &mut self.array
    }

    pub fn view(&self) -> ImageView<'_, T> {
        ImageView {
            array: self.array.view(),
            bounds: self.bounds,
            scale: self.scale,
        }
    }

    /// Narrower writable window; reborrows this view.
    pub fn sub_image_mut(&mut self, bounds: Bounds) -> Result<ImageViewMut<'_, T>> {
        let (r0, r1, c0, c1) = sub_slice_range(&self.bounds, &bounds)?;
        Ok(ImageViewMut {
            array: self.array.slice_mut(s![r0..r1, c0..c1]),
            bounds,
            scale: self.scale,
        })
    }

    pub fn get(&self, x: i32, y: i32) -> Result<T> {
        Ok(self.array[row_col(&self.bounds, x, y)?])
    }

    pub fn set(&mut self, x: i32, y: i32, value: T) -> Result<()> {
        self.array[row_col(&self.bounds, x, y)?] = value;
        Ok(())
    }

    /// Add `value` to pixel `(x, y)` if it lies inside the bounds.
    /// Returns whether the pixel was hit.
    pub fn accumulate(&mut self, x: i32, y: i32, value: f64) -> bool {
        match row_col(&self.bounds, x, y) {
            Ok(idx) => {
                let px = &mut self.array[idx];
                *px = T::from_f64(px.to_f64() + value);
                true
            }
            Err(_) => false,
        }
    }

    pub fn fill(&mut self, value: T) {
        self.array.fill(value);
    }

    pub fn set_zero(&mut self) {
        self.array.fill(T::default());
    }

    pub fn sum(&self) -> f64 {
        self.array.iter().map(|v| v.to_f64()).sum()
    }

    pub fn max(&self) -> f64 {
        self.array.iter().map(|v| v.to_f64()).fold(f64::NEG_INFINITY, f64::max)
    }

    /// Apply `f` to every pixel value (as f64).
    pub fn map_inplace<F: Fn(f64) -> f64>(&mut self, f: F) {
        self.array.mapv_inplace(|v| T::from_f64(f(v.to_f64())));
    }

    pub fn try_add_image(&mut self, other: &ImageView<'_, T>) -> Result<()> {
        check_same_bounds(&self.bounds, &other.bounds)?;
        Zip::from(&mut self.array)
            .and(&other.array)
            .for_each(|a, &b| *a = T::from_f64(a.to_f64() + b.to_f64()));
        Ok(())
    }

    pub fn try_sub_image(&mut self, other: &ImageView<'_, T>) -> Result<()> {
        check_same_bounds(&self.bounds, &other.bounds)?;
        Zip::from(&mut self.array)
            .and(&other.array)
            .for_each(|a, &b| *a = T::from_f64(a.to_f64() - b.to_f64()));
        Ok(())
    }

    /// Overwrite pixels with those of `other`; bounds must match.
    pub fn copy_from(&mut self, other: &ImageView<'_, T>) -> Result<()> {
        check_same_bounds(&self.bounds, &other.bounds)?;
        self.array.assign(&other.array);
        Ok(())
    }

    pub fn add_noise<N: NoiseModel>(&mut self, noise: &N, rng: &mut BaseDeviate) -> Result<()> {
        noise.apply(self, rng)
    }
}

macro_rules! impl_scalar_ops {
    ($target:ty $(, $lt:lifetime)?) => {
        impl<$($lt,)? T: Pixel> AddAssign<f64> for $target {
            fn add_assign(&mut self, rhs: f64) {
                self.array.mapv_inplace(|v| T::from_f64(v.to_f64() + rhs));
            }
        }

        impl<$($lt,)? T: Pixel> SubAssign<f64> for $target {
            fn sub_assign(&mut self, rhs: f64) {
                self.array.mapv_inplace(|v| T::from_f64(v.to_f64() - rhs));
            }
        }

        impl<$($lt,)? T: Pixel> MulAssign<f64> for $target {
            fn mul_assign(&mut self, rhs: f64) {
                self.array.mapv_inplace(|v| T::from_f64(v.to_f64() * rhs));
            }
        }

        impl<$($lt,)? T: Pixel> DivAssign<f64> for $target {
            fn div_assign(&mut self, rhs: f64) {
                self.array.mapv_inplace(|v| T::from_f64(v.to_f64() / rhs));
            }
        }
    };
}

impl_scalar_ops!(Image<T>);
impl_scalar_ops!(ImageViewMut<'a, T>, 'a);

/// # Panics
///
/// Panics when the bounds differ; use [`Image::try_add_image`] to get an error instead.
impl<T: Pixel> AddAssign<&Image<T>> for Image<T> {
    fn add_assign(&mut self, rhs: &Image<T>) {
        if let Err(e) = self.try_add_image(&rhs.view()) {
            panic!("{e}");
        }
    }
}

/// # Panics
///
/// Panics when the bounds differ; use [`Image::try_sub_image`] to get an error instead.
impl<T: Pixel> SubAssign<&Image<T>> for Image<T> {
    fn sub_assign(&mut self, rhs: &Image<T>) {
        if let Err(e) = self.try_sub_image(&rhs.view()) {
            panic!("{e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_new_image_is_zeroed() {
        let img = ImageD::from_size(5, 3, 0.2).unwrap();
        assert_eq!(img.array().dim(), (3, 5));
        assert_eq!(img.sum(), 0.0);
        assert_eq!(img.bounds(), Bounds::new(1, 5, 1, 3));
    }

    #[test]
    fn test_rejects_bad_scale_and_empty() {
        assert!(ImageD::from_size(5, 5, 0.0).is_err());
        assert!(ImageD::from_size(0, 5, 1.0).is_err());
        assert!(ImageD::new(Bounds::empty(), 1.0).is_err());
    }

    #[test]
    fn test_get_set_uses_bounds_coordinates() {
        let mut img = ImageF::new(Bounds::new(-2, 2, 10, 12), 1.0).unwrap();
        img.set(-2, 10, 1.5).unwrap();
        img.set(2, 12, 2.5).unwrap();
        assert_eq!(img.array()[[0, 0]], 1.5);
        assert_eq!(img.array()[[2, 4]], 2.5);
        assert_eq!(img.get(2, 12).unwrap(), 2.5);
        assert!(matches!(img.get(3, 12), Err(ProfileError::OutOfDomain(_))));
    }

    #[test]
    fn test_sub_image_aliases_parent() {
        let mut img = ImageD::from_size(8, 8, 1.0).unwrap();
        {
            let mut sub = img.sub_image_mut(Bounds::new(3, 4, 5, 6)).unwrap();
            sub.fill(2.0);
            sub.set(4, 6, 7.0).unwrap();
            sub += 1.0;
        }
        assert_eq!(img.get(3, 5).unwrap(), 3.0);
        assert_eq!(img.get(4, 6).unwrap(), 8.0);
        assert_eq!(img.get(5, 5).unwrap(), 0.0);
        assert_relative_eq!(img.sum(), 3.0 * 3.0 + 8.0, epsilon = 1e-12);
    }

    #[test]
    fn test_nested_sub_image() {
        let mut img = ImageD::from_size(10, 10, 1.0).unwrap();
        let mut outer = img.sub_image_mut(Bounds::new(2, 9, 2, 9)).unwrap();
        let mut inner = outer.sub_image_mut(Bounds::new(5, 5, 5, 5)).unwrap();
        inner.set(5, 5, 4.0).unwrap();
        assert!(outer.sub_image_mut(Bounds::new(1, 5, 5, 5)).is_err());
        assert_eq!(img.get(5, 5).unwrap(), 4.0);
    }

    #[test]
    fn test_image_arithmetic() {
        let mut a = ImageD::from_size(3, 3, 1.0).unwrap();
        a.fill(2.0);
        let mut b = a.clone();
        b *= 3.0;
        a += &b;
        assert_relative_eq!(a.sum(), 9.0 * 8.0, epsilon = 1e-12);
        a -= &b;
        a /= 2.0;
        assert_relative_eq!(a.max(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_bounds_mismatch_is_error() {
        let mut a = ImageD::from_size(3, 3, 1.0).unwrap();
        let b = ImageD::from_size(4, 3, 1.0).unwrap();
        assert!(matches!(a.try_add_image(&b.view()), Err(ProfileError::BoundsMismatch { .. })));
    }

    #[test]
    fn test_accumulate_ignores_outside() {
        let mut img = ImageF::from_size(4, 4, 1.0).unwrap();
        let mut view = img.view_mut();
        assert!(view.accumulate(1, 1, 0.5));
        assert!(!view.accumulate(0, 1, 0.5));
        assert_relative_eq!(img.sum(), 0.5, epsilon = 1e-7);
    }
}
