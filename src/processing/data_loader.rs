use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::io::Reader;
use image::{ColorType, ImageEncoder, ImageError, Rgb, RgbImage};
use log::{debug, warn};
use thiserror::Error;

use super::buffer::PixelBuffer;

pub const JPEG_QUALITY: u8 = 90;

#[derive(Error, Debug)]
pub enum DataLoaderError {
    #[error("cannot decode {}: {source}", path.display())]
    Decode { path: PathBuf, source: ImageError },
    #[error("{} has no pixels", path.display())]
    Empty { path: PathBuf },
    #[error("cannot create {}: {source}", path.display())]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot encode {}: {source}", path.display())]
    Encode { path: PathBuf, source: ImageError },
    #[error("cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Container picked for an output path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg { quality: u8 },
    Png,
}

impl OutputFormat {
    /// `.png` writes PNG; everything else, including no extension, writes JPEG.
    pub fn from_path(path: &Path) -> Self {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());

        match extension.as_deref() {
            Some("png") => OutputFormat::Png,
            _ => OutputFormat::Jpeg {
                quality: JPEG_QUALITY,
            },
        }
    }
}

/// The codec is picked from the file content, not from its extension.
pub fn load_image(path: &Path) -> Result<PixelBuffer, DataLoaderError> {
    debug!("loading {}", path.display());

    let decode_error = |source: ImageError| DataLoaderError::Decode {
        path: path.to_path_buf(),
        source,
    };
    let image = Reader::open(path)
        .and_then(Reader::with_guessed_format)
        .map_err(|e| decode_error(ImageError::IoError(e)))?
        .decode()
        .map_err(decode_error)?;
    let buffer = PixelBuffer::from_dynamic(image);

    if buffer.is_empty() {
        return Err(DataLoaderError::Empty {
            path: path.to_path_buf(),
        });
    }
    Ok(buffer)
}

pub fn save_image(path: &Path, buffer: &PixelBuffer) -> Result<(), DataLoaderError> {
    let format = OutputFormat::from_path(path);
    debug!("saving {} as {:?}", path.display(), format);

    write_with(path, |writer| encode(writer, format, buffer))
}

/// Creates `path`, runs `encode` on it and flushes. On failure the partial
/// file is removed.
fn write_with<F>(path: &Path, encode: F) -> Result<(), DataLoaderError>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<(), ImageError>,
{
    let file = File::create(path).map_err(|source| DataLoaderError::Create {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = BufWriter::new(file);

    let written = match encode(&mut writer) {
        Ok(()) => writer.flush().map_err(|source| DataLoaderError::Write {
            path: path.to_path_buf(),
            source,
        }),
        Err(source) => Err(DataLoaderError::Encode {
            path: path.to_path_buf(),
            source,
        }),
    };

    if written.is_err() {
        drop(writer);
        if let Err(e) = fs::remove_file(path) {
            warn!("could not remove partial output {}: {}", path.display(), e);
        }
    }
    written
}

fn encode<W: Write>(
    writer: &mut W,
    format: OutputFormat,
    buffer: &PixelBuffer,
) -> Result<(), ImageError> {
    let (width, height) = buffer.dimensions();

    match (format, buffer) {
        (OutputFormat::Png, PixelBuffer::Rgba(rgba)) => {
            PngEncoder::new(writer).write_image(rgba.as_raw(), width, height, ColorType::Rgba8)
        }
        (OutputFormat::Png, PixelBuffer::Gray(gray)) => {
            PngEncoder::new(writer).write_image(gray.as_raw(), width, height, ColorType::L8)
        }
        (OutputFormat::Jpeg { quality }, PixelBuffer::Rgba(rgba)) => {
            // JPEG has no alpha channel
            let rgb = RgbImage::from_fn(width, height, |x, y| {
                let [r, g, b, _] = rgba.get_pixel(x, y).0;
                Rgb([r, g, b])
            });
            JpegEncoder::new_with_quality(writer, quality).encode(
                rgb.as_raw(),
                width,
                height,
                ColorType::Rgb8,
            )
        }
        (OutputFormat::Jpeg { quality }, PixelBuffer::Gray(gray)) => {
            JpegEncoder::new_with_quality(writer, quality).encode(
                gray.as_raw(),
                width,
                height,
                ColorType::L8,
            )
        }
    }
}
