use log::trace;
use rayon::prelude::*;
use sift_core::{BorderMode, Image, ScaleSpaceError, ScaleSpaceResult};

use crate::kernel::GaussianKernel;

/// Gaussian blur primitive consumed by the scale space.
pub trait GaussianBlur: Send + Sync {
    /// Writes `input` blurred by `sigma` (in pixels) into `output`.
    ///
    /// `output` must have the same dimensions as `input`. A `sigma` of 0
    /// copies the input.
    fn blur(&self, input: &Image, output: &mut Image, sigma: f64) -> ScaleSpaceResult<()>;
}

/// Separable Gaussian convolution, horizontal pass then vertical pass.
///
/// Rows of each pass are processed in parallel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeparableGaussian {
    border: BorderMode,
}

impl SeparableGaussian {
    pub fn new(border: BorderMode) -> Self {
        Self { border }
    }

    pub fn border(&self) -> BorderMode {
        self.border
    }
}

impl GaussianBlur for SeparableGaussian {
    fn blur(&self, input: &Image, output: &mut Image, sigma: f64) -> ScaleSpaceResult<()> {
        if input.dimensions() != output.dimensions() {
            return Err(ScaleSpaceError::DimensionMismatch {
                expected: input.dimensions(),
                actual: output.dimensions(),
            });
        }
        if input.is_empty() {
            return Err(ScaleSpaceError::EmptyInput {
                width: input.width(),
                height: input.height(),
            });
        }
        if sigma == 0.0 {
            output.data_mut().copy_from_slice(input.data());
            return Ok(());
        }

        let kernel = GaussianKernel::new(sigma)?;
        trace!(
            "gaussian blur {}x{} sigma={:.4} radius={}",
            input.width(),
            input.height(),
            sigma,
            kernel.radius()
        );

        let mut tmp = Image::new(input.width(), input.height());
        horizontal_pass(input, &mut tmp, &kernel, self.border);
        vertical_pass(&tmp, output, &kernel, self.border);
        Ok(())
    }
}

/// Allocating convenience wrapper around [`SeparableGaussian`].
pub fn gaussian_blur(input: &Image, sigma: f64, border: BorderMode) -> ScaleSpaceResult<Image> {
    let mut output = Image::new(input.width(), input.height());
    SeparableGaussian::new(border).blur(input, &mut output, sigma)?;
    Ok(output)
}

fn horizontal_pass(src: &Image, dst: &mut Image, kernel: &GaussianKernel, border: BorderMode) {
    let width = src.width();
    dst.data_mut()
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, out_row)| convolve_row(src.row(y), out_row, kernel, border));
}

fn vertical_pass(src: &Image, dst: &mut Image, kernel: &GaussianKernel, border: BorderMode) {
    let width = src.width();
    let height = src.height();
    let radius = kernel.radius() as isize;
    let weights = kernel.weights();

    dst.data_mut()
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, out_row)| {
            out_row.fill(0.0);
            for (k, &w) in weights.iter().enumerate() {
                let sy = border.map_index(y as isize + k as isize - radius, height);
                for (o, &s) in out_row.iter_mut().zip(src.row(sy)) {
                    *o += w * s;
                }
            }
        });
}

fn convolve_row(row: &[f32], out: &mut [f32], kernel: &GaussianKernel, border: BorderMode) {
    let n = row.len();
    let radius = kernel.radius();
    let weights = kernel.weights();

    for (x, out_x) in out.iter_mut().enumerate() {
        let mut acc = 0.0f32;
        if x >= radius && x + radius < n {
            // Interior: whole footprint inside the row
            let window = &row[x - radius..=x + radius];
            for (&s, &w) in window.iter().zip(weights) {
                acc += s * w;
            }
        } else {
            for (k, &w) in weights.iter().enumerate() {
                let sx = border.map_index(x as isize + k as isize - radius as isize, n);
                acc += row[sx] * w;
            }
        }
        *out_x = acc;
    }
}
