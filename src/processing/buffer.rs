use image::{DynamicImage, GrayImage, RgbaImage};

/// Decoded pixels handed between transforms.
///
/// Every transform takes a buffer by reference and returns a new one, so a
/// buffer is never mutated once it has been produced.
#[derive(Debug, Clone, PartialEq)]
pub enum PixelBuffer {
    Rgba(RgbaImage),
    Gray(GrayImage),
}

impl PixelBuffer {
    /// Single channel 8-bit images stay single channel, anything else is
    /// widened or narrowed to RGBA8.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        match image {
            DynamicImage::ImageLuma8(gray) => PixelBuffer::Gray(gray),
            other => PixelBuffer::Rgba(other.to_rgba8()),
        }
    }

    pub fn into_dynamic(self) -> DynamicImage {
        match self {
            PixelBuffer::Rgba(rgba) => DynamicImage::ImageRgba8(rgba),
            PixelBuffer::Gray(gray) => DynamicImage::ImageLuma8(gray),
        }
    }

    pub fn width(&self) -> u32 {
        self.dimensions().0
    }

    pub fn height(&self) -> u32 {
        self.dimensions().1
    }

    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            PixelBuffer::Rgba(rgba) => rgba.dimensions(),
            PixelBuffer::Gray(gray) => gray.dimensions(),
        }
    }

    pub fn is_empty(&self) -> bool {
        let (width, height) = self.dimensions();
        width == 0 || height == 0
    }

    pub fn channel_count(&self) -> u8 {
        match self {
            PixelBuffer::Rgba(_) => 4,
            PixelBuffer::Gray(_) => 1,
        }
    }
}

impl From<RgbaImage> for PixelBuffer {
    fn from(image: RgbaImage) -> Self {
        PixelBuffer::Rgba(image)
    }
}

impl From<GrayImage> for PixelBuffer {
    fn from(image: GrayImage) -> Self {
        PixelBuffer::Gray(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb, RgbImage};

    #[test]
    fn luma8_stays_single_channel() {
        let gray = GrayImage::from_pixel(3, 2, Luma([7]));
        let buffer = PixelBuffer::from_dynamic(DynamicImage::ImageLuma8(gray));

        assert_eq!(buffer.channel_count(), 1);
        assert_eq!(buffer.dimensions(), (3, 2));
    }

    #[test]
    fn rgb8_is_widened_to_opaque_rgba() {
        let rgb = RgbImage::from_pixel(2, 2, Rgb([10, 20, 30]));
        let buffer = PixelBuffer::from_dynamic(DynamicImage::ImageRgb8(rgb));

        match buffer {
            PixelBuffer::Rgba(rgba) => assert_eq!(rgba.get_pixel(1, 1).0, [10, 20, 30, 255]),
            PixelBuffer::Gray(_) => panic!("expected rgba buffer"),
        }
    }

    #[test]
    fn empty_buffer_is_reported() {
        let buffer = PixelBuffer::from(RgbaImage::new(0, 4));
        assert!(buffer.is_empty());
        assert_eq!(buffer.height(), 4);
    }
}
