//! Filtering and resampling primitives used to build a Gaussian scale space.
//!
//! Every operation works on [`sift_core::Image`] and uses a single border
//! extension policy chosen by the caller.

mod blur;
mod kernel;
mod resample;

pub use blur::{gaussian_blur, GaussianBlur, SeparableGaussian};
pub use kernel::GaussianKernel;
pub use resample::{area_average_by_two, decimate, upsample_bilinear, BilinearResampler, Resampler};
