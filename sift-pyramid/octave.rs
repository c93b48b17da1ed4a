use sift_core::{Image, ScaleSpaceError, ScaleSpaceResult};

/// One resolution level of the scale space.
///
/// The scale images of an octave are allocated together when the octave is
/// built and released together when it is dropped. Once built an octave is
/// never modified.
#[derive(Debug, Clone)]
pub struct Octave {
    index: i32,
    width: usize,
    height: usize,
    images: Vec<Image>,
    sigmas: Vec<f64>,
}

impl Octave {
    pub(crate) fn new(index: i32, images: Vec<Image>, sigmas: Vec<f64>) -> Self {
        debug_assert_eq!(images.len(), sigmas.len());
        let (width, height) = images.first().map(Image::dimensions).unwrap_or((0, 0));
        Self {
            index,
            width,
            height,
            images,
            sigmas,
        }
    }

    pub fn index(&self) -> i32 {
        self.index
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

    /// Number of scale images
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn images(&self) -> &[Image] {
        &self.images
    }

    /// Absolute blur of every scale image, in input pixel units.
    pub fn sigmas(&self) -> &[f64] {
        &self.sigmas
    }

    pub fn image(&self, scale: usize) -> ScaleSpaceResult<&Image> {
        self.images.get(scale).ok_or(ScaleSpaceError::IndexOutOfRange {
            index: scale,
            len: self.images.len(),
        })
    }

    pub fn sigma(&self, scale: usize) -> ScaleSpaceResult<f64> {
        self.sigmas
            .get(scale)
            .copied()
            .ok_or(ScaleSpaceError::IndexOutOfRange {
                index: scale,
                len: self.sigmas.len(),
            })
    }

    /// Size of one pixel of this octave, in input pixels.
    pub fn pixel_scale(&self) -> f64 {
        (self.index as f64).exp2()
    }

    /// Blur of a scale image measured in this octave's pixels.
    pub fn pixel_sigma(&self, scale: usize) -> ScaleSpaceResult<f64> {
        Ok(self.sigma(scale)? / self.pixel_scale())
    }

    /// `image(scale + 1) - image(scale)`, for `scale < len() - 1`.
    pub fn difference_of_gaussian(&self, scale: usize) -> ScaleSpaceResult<Image> {
        let len = self.images.len().saturating_sub(1);
        if scale >= len {
            return Err(ScaleSpaceError::IndexOutOfRange { index: scale, len });
        }
        self.images[scale + 1].subtract(&self.images[scale])
    }

    /// All adjacent differences, in scale order.
    pub fn difference_of_gaussians(&self) -> ScaleSpaceResult<Vec<Image>> {
        self.images
            .windows(2)
            .map(|pair| pair[1].subtract(&pair[0]))
            .collect()
    }
}
