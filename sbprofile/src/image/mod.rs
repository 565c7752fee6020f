//! Pixel grids, their bounds and the noise models that perturb them.

pub mod bounds;
pub mod buffer;
pub mod noise;

pub use bounds::Bounds;
pub use buffer::{Image, ImageD, ImageF, ImageView, ImageViewMut, Pixel};
pub use noise::{add_noise_snr, CcdNoise, GaussianNoise, NoiseModel, PoissonNoise};
