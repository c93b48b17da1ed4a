//! Multi-octave Gaussian scale space for SIFT-style detectors.
//!
//! A [`ScaleSpace`] is initialized from an input image and then advanced
//! one octave at a time. Every octave holds `scales_per_octave + 3` images
//! whose absolute blur follows `base_sigma * 2^(octave + k / scales_per_octave)`.

mod builder;
mod octave;
mod scale_space;

#[cfg(test)]
mod tests;

pub use builder::ScaleSpaceBuilder;
pub use octave::Octave;
pub use scale_space::{Advance, PyramidState, ScaleSpace};

pub use sift_core::{
    self, init_thread_pool, BorderMode, DownsampleMode, Image, ScaleSpaceConfig, ScaleSpaceError,
    ScaleSpaceResult,
};
pub use sift_filter::{self, BilinearResampler, GaussianBlur, Resampler, SeparableGaussian};
