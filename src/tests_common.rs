use std::path::{Path, PathBuf};

use image::{Rgba, RgbaImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::processing::buffer::PixelBuffer;
use crate::processing::data_loader::save_image;

pub fn solid_rgba(width: u32, height: u32, pixel: [u8; 4]) -> PixelBuffer {
    PixelBuffer::from(RgbaImage::from_pixel(width, height, Rgba(pixel)))
}

/// Linear ramps along both axes, smooth enough for bilinear sampling.
pub fn gradient_rgba(width: u32, height: u32) -> PixelBuffer {
    PixelBuffer::from(RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x * 10) as u8, (y * 15) as u8, ((x + y) * 5) as u8, 255])
    }))
}

pub fn random_rgba(width: u32, height: u32, seed: u64) -> PixelBuffer {
    let mut rng = StdRng::seed_from_u64(seed);
    PixelBuffer::from(RgbaImage::from_fn(width, height, |_, _| Rgba(rng.gen())))
}

pub fn write_test_image(dir: &Path, name: &str, buffer: &PixelBuffer) -> PathBuf {
    let path = dir.join(name);
    save_image(&path, buffer).unwrap();
    path
}
