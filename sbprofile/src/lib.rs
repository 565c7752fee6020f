//! Surface-brightness profiles and their rendering.
//!
//! Build a [`Profile`] tree from atomic shapes, combine it with sums,
//! convolutions and affine transforms, then render it with
//! [`render::draw`] (real-space sampling or FFT) or [`render::draw_shoot`]
//! (photon shooting). Randomness always comes from an explicit
//! [`BaseDeviate`].

pub mod batch;
pub mod error;
pub mod image;
pub mod params;
pub mod photon;
pub mod profile;
pub mod random;
pub mod render;
pub mod transform;

pub use batch::{render_stamps, render_stamps_sequential};
pub use error::{ProfileError, Result};
pub use image::{Bounds, Image, ImageD, ImageF};
pub use params::GsParams;
pub use photon::{PhotonArray, Sensor};
pub use profile::{
    Airy, BoxProfile, Convolution, Exponential, Gaussian, InterpolatedImage, Interpolant, Kolmogorov, Moffat,
    Profile, Sersic, Sum, SurfaceBrightness, Transformed,
};
pub use random::BaseDeviate;
pub use render::{draw, draw_new, draw_shoot, DrawOptions, DrawReport, Method, Normalization, ShootOptions};
pub use transform::{AffineTransform, Distortion, Shear};
