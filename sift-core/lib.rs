//! Shared types for building Gaussian scale spaces: the `f32` intensity
//! image, border policy, configuration and the error type.

mod border;
mod buffer;
mod config;
mod error;
#[cfg(feature = "image")]
mod interop;

pub use border::BorderMode;
pub use buffer::Image;
pub use config::{octave_length, DownsampleMode, ScaleSpaceConfig, MAX_LAST_OCTAVE, MIN_FIRST_OCTAVE};
pub use error::{ScaleSpaceError, ScaleSpaceResult};
#[cfg(feature = "image")]
pub use interop::LumaF32Image;

/// Initialize Rayon thread pool with the specified number of threads
pub fn init_thread_pool(n_threads: usize) -> Result<(), rayon::ThreadPoolBuildError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(n_threads)
        .build_global()
}
