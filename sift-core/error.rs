use thiserror::Error;

/// Errors raised while configuring, building or querying a scale space.
///
/// All of these are contract violations by the caller. None of them is
/// transient, so nothing in the workspace retries on them.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScaleSpaceError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Empty input image: {width}x{height}")]
    EmptyInput { width: usize, height: usize },

    #[error("Scale index {index} out of range (valid: 0..{len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Octave {octave} has not been built")]
    ExhaustedPyramid { octave: i32 },

    #[error("Octave {octave} was released by the retention policy")]
    OctaveEvicted { octave: i32 },

    #[error("Scale space has not been initialized")]
    NotInitialized,

    #[error("Image data length mismatch: expected {expected_len}, got {actual_len}")]
    InvalidImageData { expected_len: usize, actual_len: usize },

    #[error("Image dimensions mismatch: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },
}

pub type ScaleSpaceResult<T> = Result<T, ScaleSpaceError>;
