//! Pixel transforms executed by the workers.
//!
//! | Operation | Function |
//! |---|---|
//! | Resize | [`resize`]: bilinear, edge pixels replicated |
//! | Grayscale | [`grayscale`]: luma `0.299R + 0.587G + 0.114B`, truncated |
//! | Blur | [`blur`]: square Gaussian kernel, edge pixels replicated |
//!
//! All of them are pure: the input buffer is borrowed and a new buffer is
//! returned. None of them can fail on a decoded buffer.

mod blur;
mod grayscale;
mod resize;

pub use blur::{blur, GaussianKernel, MAX_KERNEL_SIDE};
pub use grayscale::{grayscale, luma};
pub use resize::resize;

use image::{ImageBuffer, Pixel};

use crate::processing::buffer::PixelBuffer;

/// Widest pixel layout the generic filters have to handle (RGBA).
const MAX_CHANNELS: usize = 4;

type Buffer<P> = ImageBuffer<P, Vec<u8>>;

pub(crate) fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + t * (b - a)
}

/// Rounds to the nearest integer and clamps into `[0, 255]`.
pub(crate) fn to_channel(value: f64) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// Clamps a possibly out of range coordinate onto `[0, len)`.
pub(crate) fn clamp_coord(coord: i64, len: u32) -> u32 {
    coord.clamp(0, i64::from(len) - 1) as u32
}

pub(crate) fn from_channels<P>(channels: &[u8]) -> P
where
    P: Pixel<Subpixel = u8>,
{
    *P::from_slice(channels)
}

pub(crate) fn map_layout<F, G>(buffer: &PixelBuffer, rgba: F, gray: G) -> PixelBuffer
where
    F: FnOnce(&Buffer<image::Rgba<u8>>) -> Buffer<image::Rgba<u8>>,
    G: FnOnce(&Buffer<image::Luma<u8>>) -> Buffer<image::Luma<u8>>,
{
    match buffer {
        PixelBuffer::Rgba(image) => PixelBuffer::Rgba(rgba(image)),
        PixelBuffer::Gray(image) => PixelBuffer::Gray(gray(image)),
    }
}
