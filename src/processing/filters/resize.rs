use std::num::NonZeroU32;

use image::{ImageBuffer, Pixel};

use super::{clamp_coord, from_channels, lerp, map_layout, to_channel, Buffer, MAX_CHANNELS};
use crate::processing::buffer::PixelBuffer;

/// Bilinear resize to exactly `width` x `height`.
///
/// No aspect ratio is preserved. The channel layout of the source is kept.
pub fn resize(buffer: &PixelBuffer, width: NonZeroU32, height: NonZeroU32) -> PixelBuffer {
    map_layout(
        buffer,
        |image| resize_image(image, width, height),
        |image| resize_image(image, width, height),
    )
}

fn resize_image<P>(src: &Buffer<P>, width: NonZeroU32, height: NonZeroU32) -> Buffer<P>
where
    P: Pixel<Subpixel = u8>,
{
    let (new_width, new_height) = (width.get(), height.get());
    let (src_width, src_height) = src.dimensions();

    if src_width == 0 || src_height == 0 {
        return ImageBuffer::new(new_width, new_height);
    }

    let x_ratio = f64::from(src_width) / f64::from(new_width);
    let y_ratio = f64::from(src_height) / f64::from(new_height);
    let channels = usize::from(P::CHANNEL_COUNT);

    ImageBuffer::from_fn(new_width, new_height, |x, y| {
        let src_x = f64::from(x) * x_ratio;
        let src_y = f64::from(y) * y_ratio;

        let x1 = src_x.floor() as i64;
        let y1 = src_y.floor() as i64;
        let wx = src_x - x1 as f64;
        let wy = src_y - y1 as f64;

        let (left, right) = (clamp_coord(x1, src_width), clamp_coord(x1 + 1, src_width));
        let (top, bottom) = (clamp_coord(y1, src_height), clamp_coord(y1 + 1, src_height));

        let top_left = src.get_pixel(left, top).channels();
        let top_right = src.get_pixel(right, top).channels();
        let bottom_left = src.get_pixel(left, bottom).channels();
        let bottom_right = src.get_pixel(right, bottom).channels();

        let mut out = [0u8; MAX_CHANNELS];
        for c in 0..channels {
            let upper = lerp(f64::from(top_left[c]), f64::from(top_right[c]), wx);
            let lower = lerp(f64::from(bottom_left[c]), f64::from(bottom_right[c]), wx);
            out[c] = to_channel(lerp(upper, lower, wy));
        }

        from_channels(&out[..channels])
    })
}
