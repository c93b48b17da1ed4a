use crate::error::{ScaleSpaceError, ScaleSpaceResult};

/// Row-major single channel `f32` intensity image.
///
/// Sample values are unconstrained; nothing clamps them to `[0, 255]`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Image {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl Image {
    /// Zero-filled image.
    pub fn new(width: usize, height: usize) -> Self {
        Self::filled(width, height, 0.0)
    }

    pub fn filled(width: usize, height: usize, value: f32) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    /// Wraps an existing buffer, checking that it holds `width * height` samples.
    pub fn from_vec(width: usize, height: usize, data: Vec<f32>) -> ScaleSpaceResult<Self> {
        let expected_len = width
            .checked_mul(height)
            .ok_or(ScaleSpaceError::InvalidImageData {
                expected_len: usize::MAX,
                actual_len: data.len(),
            })?;

        if data.len() != expected_len {
            return Err(ScaleSpaceError::InvalidImageData {
                expected_len,
                actual_len: data.len(),
            });
        }

        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Builds an image by evaluating `f(x, y)` at every pixel.
    pub fn from_fn<F>(width: usize, height: usize, mut f: F) -> Self
    where
        F: FnMut(usize, usize) -> f32,
    {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn area(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    pub fn get(&self, x: usize, y: usize) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data.get(y * self.width + x).copied()
    }

    /// Writes a sample. Returns `false` when `(x, y)` lies outside the image.
    pub fn set(&mut self, x: usize, y: usize, value: f32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        self.data[y * self.width + x] = value;
        true
    }

    /// Sample lookup for callers that already checked bounds.
    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> f32 {
        debug_assert!(x < self.width && y < self.height);
        self.data[y * self.width + x]
    }

    pub fn row(&self, y: usize) -> &[f32] {
        let start = y * self.width;
        &self.data[start..start + self.width]
    }

    pub fn row_mut(&mut self, y: usize) -> &mut [f32] {
        let start = y * self.width;
        &mut self.data[start..start + self.width]
    }

    /// Mean sample value, 0 for an empty image.
    pub fn mean(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.data.iter().map(|&v| v as f64).sum::<f64>() / self.data.len() as f64
    }

    /// Per-pixel `self - other`.
    pub fn subtract(&self, other: &Image) -> ScaleSpaceResult<Image> {
        if self.dimensions() != other.dimensions() {
            return Err(ScaleSpaceError::DimensionMismatch {
                expected: self.dimensions(),
                actual: other.dimensions(),
            });
        }
        let data = self
            .data
            .iter()
            .zip(other.data.iter())
            .map(|(a, b)| a - b)
            .collect();
        Ok(Image {
            width: self.width,
            height: self.height,
            data,
        })
    }
}
