use rayon::prelude::*;
use sift_core::{octave_length, DownsampleMode, Image, ScaleSpaceError, ScaleSpaceResult};

/// Resampling primitives consumed by the scale space.
///
/// All operations keep pixel `x` of a reduced image aligned with pixel
/// `x * step` of its source, and pixel `x * factor` of an enlarged image
/// aligned with pixel `x` of its source.
pub trait Resampler: Send + Sync {
    /// Enlarge by an integer `factor`, returning a new image.
    fn upsample(&self, image: &Image, factor: usize) -> ScaleSpaceResult<Image>;

    /// Reduce to exactly `width` x `height`, taking samples two pixels apart.
    fn downsample_to(&self, image: &Image, width: usize, height: usize) -> ScaleSpaceResult<Image>;

    /// Halve both dimensions, rounding odd sizes up.
    fn downsample_by_two(&self, image: &Image) -> ScaleSpaceResult<Image> {
        self.downsample_to(image, octave_length(image.width(), 1), octave_length(image.height(), 1))
    }
}

/// Bilinear enlargement, decimating or area-averaging reduction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BilinearResampler {
    mode: DownsampleMode,
}

impl BilinearResampler {
    pub fn new(mode: DownsampleMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> DownsampleMode {
        self.mode
    }
}

impl Resampler for BilinearResampler {
    fn upsample(&self, image: &Image, factor: usize) -> ScaleSpaceResult<Image> {
        upsample_bilinear(image, factor)
    }

    fn downsample_to(&self, image: &Image, width: usize, height: usize) -> ScaleSpaceResult<Image> {
        match self.mode {
            DownsampleMode::Decimate => decimate(image, 2, width, height),
            DownsampleMode::AreaAverage => area_average_by_two(image, width, height),
        }
    }
}

fn check_non_empty(image: &Image) -> ScaleSpaceResult<()> {
    if image.is_empty() {
        return Err(ScaleSpaceError::EmptyInput {
            width: image.width(),
            height: image.height(),
        });
    }
    Ok(())
}

fn check_target(width: usize, height: usize) -> ScaleSpaceResult<()> {
    if width == 0 || height == 0 {
        return Err(ScaleSpaceError::EmptyInput { width, height });
    }
    Ok(())
}

/// Enlarge by `factor` with bilinear interpolation.
///
/// Output pixel `x` samples source coordinate `x / factor`; coordinates past
/// the last source sample replicate it.
pub fn upsample_bilinear(image: &Image, factor: usize) -> ScaleSpaceResult<Image> {
    check_non_empty(image)?;
    if factor == 0 {
        return Err(ScaleSpaceError::InvalidConfiguration(
            "upsample factor must be at least 1".to_string(),
        ));
    }
    if factor == 1 {
        return Ok(image.clone());
    }

    let (src_w, src_h) = image.dimensions();
    let (dst_w, dst_h) = (src_w * factor, src_h * factor);

    // Per-column source indices and weights, shared by every row
    let columns: Vec<(usize, usize, f32)> = (0..dst_w).map(|x| sample_position(x, factor, src_w)).collect();

    let mut out = Image::new(dst_w, dst_h);
    out.data_mut()
        .par_chunks_mut(dst_w)
        .enumerate()
        .for_each(|(y, out_row)| {
            let (y0, y1, fy) = sample_position(y, factor, src_h);
            let top = image.row(y0);
            let bottom = image.row(y1);
            for (o, &(x0, x1, fx)) in out_row.iter_mut().zip(&columns) {
                let t = top[x0] * (1.0 - fx) + top[x1] * fx;
                let b = bottom[x0] * (1.0 - fx) + bottom[x1] * fx;
                *o = t * (1.0 - fy) + b * fy;
            }
        });
    Ok(out)
}

#[inline]
fn sample_position(dst: usize, factor: usize, src_len: usize) -> (usize, usize, f32) {
    let i0 = dst / factor;
    if i0 + 1 >= src_len {
        return (src_len - 1, src_len - 1, 0.0);
    }
    let frac = (dst % factor) as f32 / factor as f32;
    (i0, i0 + 1, frac)
}

/// Keep every `step`-th sample: output `(x, y)` is input `(x * step, y * step)`,
/// clamped to the last row/column.
pub fn decimate(image: &Image, step: usize, width: usize, height: usize) -> ScaleSpaceResult<Image> {
    check_non_empty(image)?;
    check_target(width, height)?;
    if step == 0 {
        return Err(ScaleSpaceError::InvalidConfiguration(
            "decimation step must be at least 1".to_string(),
        ));
    }

    let (src_w, src_h) = image.dimensions();
    let mut out = Image::new(width, height);
    out.data_mut()
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, out_row)| {
            let src_row = image.row((y * step).min(src_h - 1));
            for (x, o) in out_row.iter_mut().enumerate() {
                *o = src_row[(x * step).min(src_w - 1)];
            }
        });
    Ok(out)
}

/// Mean of the 2x2 block at `(2x, 2y)`. Blocks hanging over the edge reuse
/// the last row/column.
pub fn area_average_by_two(image: &Image, width: usize, height: usize) -> ScaleSpaceResult<Image> {
    check_non_empty(image)?;
    check_target(width, height)?;

    let (src_w, src_h) = image.dimensions();
    let mut out = Image::new(width, height);
    out.data_mut()
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, out_row)| {
            let r0 = image.row((2 * y).min(src_h - 1));
            let r1 = image.row((2 * y + 1).min(src_h - 1));
            for (x, o) in out_row.iter_mut().enumerate() {
                let x0 = (2 * x).min(src_w - 1);
                let x1 = (2 * x + 1).min(src_w - 1);
                *o = 0.25 * (r0[x0] + r0[x1] + r1[x0] + r1[x1]);
            }
        });
    Ok(out)
}
