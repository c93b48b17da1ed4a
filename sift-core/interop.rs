use image::{GrayImage, ImageBuffer, Luma};

use crate::buffer::Image;

/// Single channel `f32` buffer from the `image` crate.
pub type LumaF32Image = ImageBuffer<Luma<f32>, Vec<f32>>;

impl From<&GrayImage> for Image {
    fn from(img: &GrayImage) -> Self {
        let (w, h) = img.dimensions();
        Image::from_fn(w as usize, h as usize, |x, y| img.get_pixel(x as u32, y as u32)[0] as f32)
    }
}

impl From<&LumaF32Image> for Image {
    fn from(img: &LumaF32Image) -> Self {
        let (w, h) = img.dimensions();
        Image::from_fn(w as usize, h as usize, |x, y| img.get_pixel(x as u32, y as u32)[0])
    }
}

impl Image {
    /// Copy into an `image` crate buffer.
    pub fn to_luma32f(&self) -> Option<LumaF32Image> {
        ImageBuffer::from_raw(self.width() as u32, self.height() as u32, self.data().to_vec())
    }

    /// Copy into an 8-bit buffer, rounding and saturating to `[0, 255]`.
    pub fn to_gray8(&self) -> Option<GrayImage> {
        let bytes = self
            .data()
            .iter()
            .map(|&v| v.round().clamp(0.0, 255.0) as u8)
            .collect();
        GrayImage::from_raw(self.width() as u32, self.height() as u32, bytes)
    }
}
