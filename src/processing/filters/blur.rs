use image::{ImageBuffer, Pixel};

use super::{clamp_coord, from_channels, map_layout, to_channel, Buffer, MAX_CHANNELS};
use crate::processing::buffer::PixelBuffer;

/// Largest kernel side ever built, whatever the radius.
pub const MAX_KERNEL_SIDE: usize = 1025;

/// Normalised square Gaussian kernel.
///
/// The side is `ceil(2 * radius) + 1`, bumped to the next odd number, and
/// `sigma = radius / 3`. A radius that is not strictly positive yields the
/// 1x1 identity kernel. The side never exceeds [`MAX_KERNEL_SIDE`].
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianKernel {
    size: usize,
    weights: Vec<f64>,
}

impl GaussianKernel {
    pub fn new(radius: f64) -> Self {
        Self::with_max_side(radius, MAX_KERNEL_SIDE)
    }

    /// Same weights as [`GaussianKernel::new`], with the window cut to at
    /// most `max_side` (rounded down to odd) before normalising.
    pub fn with_max_side(radius: f64, max_side: usize) -> Self {
        if !(radius > 0.0) || !radius.is_finite() {
            return Self::identity();
        }

        let mut max_side = max_side.clamp(1, MAX_KERNEL_SIDE);
        if max_side % 2 == 0 {
            max_side -= 1;
        }

        // saturating float cast keeps huge radii finite here
        let mut size = ((radius * 2.0).ceil() as usize).saturating_add(1);
        if size % 2 == 0 {
            size += 1;
        }
        let size = size.min(max_side);
        if size == 1 {
            return Self::identity();
        }

        let center = (size / 2) as f64;
        let sigma = radius / 3.0;
        let two_sigma_squared = 2.0 * sigma * sigma;
        if two_sigma_squared == 0.0 {
            return Self::identity();
        }

        let mut weights = Vec::with_capacity(size * size);
        for ky in 0..size {
            for kx in 0..size {
                let dx = kx as f64 - center;
                let dy = ky as f64 - center;
                weights.push((-(dx * dx + dy * dy) / two_sigma_squared).exp());
            }
        }

        let sum: f64 = weights.iter().sum();
        if !(sum > 0.0) || !sum.is_finite() {
            return Self::identity();
        }
        for weight in &mut weights {
            *weight /= sum;
        }

        Self { size, weights }
    }

    fn identity() -> Self {
        Self {
            size: 1,
            weights: vec![1.0],
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn weight(&self, kx: usize, ky: usize) -> f64 {
        self.weights[ky * self.size + kx]
    }

    pub fn sum(&self) -> f64 {
        self.weights.iter().sum()
    }
}

/// Gaussian blur with replicate-edge boundaries, applied to every channel.
///
/// Taps further out than the image extent only repeat edge pixels, so the
/// kernel side is capped at `2 * max(width, height) + 1`.
pub fn blur(buffer: &PixelBuffer, radius: f64) -> PixelBuffer {
    let (width, height) = buffer.dimensions();
    let extent = usize::try_from(width.max(height)).unwrap_or(usize::MAX);
    let kernel = GaussianKernel::with_max_side(radius, extent.saturating_mul(2).saturating_add(1));
    if kernel.size() == 1 {
        return buffer.clone();
    }

    map_layout(
        buffer,
        |image| convolve(image, &kernel),
        |image| convolve(image, &kernel),
    )
}

fn convolve<P>(src: &Buffer<P>, kernel: &GaussianKernel) -> Buffer<P>
where
    P: Pixel<Subpixel = u8>,
{
    let (width, height) = src.dimensions();
    if width == 0 || height == 0 {
        return src.clone();
    }

    let channels = usize::from(P::CHANNEL_COUNT);
    let size = kernel.size();
    let offset = (size / 2) as i64;

    ImageBuffer::from_fn(width, height, |x, y| {
        let mut acc = [0f64; MAX_CHANNELS];
        let mut total_weight = 0.0;

        for ky in 0..size {
            let sy = clamp_coord(i64::from(y) + ky as i64 - offset, height);
            for kx in 0..size {
                let sx = clamp_coord(i64::from(x) + kx as i64 - offset, width);
                let weight = kernel.weight(kx, ky);
                total_weight += weight;

                let pixel = src.get_pixel(sx, sy).channels();
                for c in 0..channels {
                    acc[c] += f64::from(pixel[c]) * weight;
                }
            }
        }

        let mut out = [0u8; MAX_CHANNELS];
        for c in 0..channels {
            let value = if total_weight > 0.0 {
                acc[c] / total_weight
            } else {
                acc[c]
            };
            out[c] = to_channel(value);
        }

        from_channels(&out[..channels])
    })
}
