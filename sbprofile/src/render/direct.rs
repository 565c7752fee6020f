//! Real-space sampling at pixel centers.

use ndarray::Array2;

use super::Placement;
use crate::image::Bounds;
use crate::profile::Profile;

pub(crate) fn render(profile: &Profile, bounds: &Bounds, scale: f64, placement: &Placement) -> Array2<f64> {
    Array2::from_shape_fn((bounds.nrow(), bounds.ncol()), |(row, col)| {
        let ix = bounds.xmin + col as i32;
        let iy = bounds.ymin + row as i32;
        profile.xval(&placement.world(ix, iy, scale))
    })
}
