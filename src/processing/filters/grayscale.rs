use image::{GrayImage, Luma};

use crate::processing::buffer::PixelBuffer;

/// ITU-R BT.601 luma, truncated to 8 bits.
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    (0.299 * f64::from(r) + 0.587 * f64::from(g) + 0.114 * f64::from(b)) as u8
}

/// Converts to a single channel buffer of the same size. Alpha is ignored.
pub fn grayscale(buffer: &PixelBuffer) -> PixelBuffer {
    match buffer {
        // luma of a gray pixel is the pixel itself
        PixelBuffer::Gray(gray) => PixelBuffer::Gray(gray.clone()),
        PixelBuffer::Rgba(rgba) => {
            let (width, height) = rgba.dimensions();
            PixelBuffer::Gray(GrayImage::from_fn(width, height, |x, y| {
                let [r, g, b, _] = rgba.get_pixel(x, y).0;
                Luma([luma(r, g, b)])
            }))
        }
    }
}
