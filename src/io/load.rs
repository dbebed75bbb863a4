use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use image::{DynamicImage, ImageReader};
use ndarray::{Array3, s};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::native::{Header, NativeError, NativeImage, TileRect, ops};
use crate::types::{Access, BandFormat};

/// Options for opening an image file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadOptions {
    pub access: Access,
}

impl LoadOptions {
    pub fn sequential() -> Self {
        Self {
            access: Access::Sequential,
        }
    }
}

fn interleaved<T: Copy + Into<f64>>(
    raw: &[T],
    width: usize,
    height: usize,
    bands: usize,
) -> Array3<f64> {
    Array3::from_shape_fn((height, width, bands), |(y, x, b)| {
        raw[(y * width + x) * bands + b].into()
    })
}

/// Convert a decoded image to `(rows, cols, bands)` pixels and a band format.
fn decoded_to_array(decoded: DynamicImage) -> (Array3<f64>, BandFormat) {
    let (w, h) = (decoded.width() as usize, decoded.height() as usize);
    match decoded {
        DynamicImage::ImageLuma8(b) => (interleaved(b.as_raw(), w, h, 1), BandFormat::UChar),
        DynamicImage::ImageLumaA8(b) => (interleaved(b.as_raw(), w, h, 2), BandFormat::UChar),
        DynamicImage::ImageRgb8(b) => (interleaved(b.as_raw(), w, h, 3), BandFormat::UChar),
        DynamicImage::ImageRgba8(b) => (interleaved(b.as_raw(), w, h, 4), BandFormat::UChar),
        DynamicImage::ImageLuma16(b) => (interleaved(b.as_raw(), w, h, 1), BandFormat::UShort),
        DynamicImage::ImageLumaA16(b) => (interleaved(b.as_raw(), w, h, 2), BandFormat::UShort),
        DynamicImage::ImageRgb16(b) => (interleaved(b.as_raw(), w, h, 3), BandFormat::UShort),
        DynamicImage::ImageRgba16(b) => (interleaved(b.as_raw(), w, h, 4), BandFormat::UShort),
        DynamicImage::ImageRgb32F(b) => (interleaved(b.as_raw(), w, h, 3), BandFormat::Float),
        DynamicImage::ImageRgba32F(b) => (interleaved(b.as_raw(), w, h, 4), BandFormat::Float),
        other => (
            interleaved(other.to_rgba8().as_raw(), w, h, 4),
            BandFormat::UChar,
        ),
    }
}

/// Memory image that can only be read top to bottom, once.
fn sequential(pixels: Array3<f64>, format: BandFormat) -> NativeImage {
    let (height, width, bands) = pixels.dim();
    let pixels = Arc::new(pixels);
    let floor = Arc::new(AtomicUsize::new(0));
    NativeImage::new(
        Header::new(width, height, bands, format),
        Arc::new(move |r: TileRect| {
            let previous = floor.fetch_max(r.top, Ordering::SeqCst);
            if r.top < previous {
                return Err(NativeError::OutOfOrderRead { line: r.top });
            }
            Ok(pixels
                .slice(s![r.top..r.bottom(), r.left..r.right(), ..])
                .to_owned())
        }),
    )
}

/// Open and decode an image file. The format is detected from the contents.
pub fn load_file(path: &Path, options: &LoadOptions) -> Result<NativeImage, NativeError> {
    let decoded = ImageReader::open(path)?
        .with_guessed_format()?
        .decode()
        .map_err(|e| NativeError::Decode {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
    let (pixels, format) = decoded_to_array(decoded);
    let (height, width, bands) = pixels.dim();
    info!(
        "Loaded {}: {}x{}, {} band(s) {}, {} access",
        path.display(),
        width,
        height,
        bands,
        format,
        options.access.name()
    );

    let image = match options.access {
        Access::Random => ops::memory(pixels, format),
        Access::Sequential => sequential(pixels, format),
    };
    image.update_header(|h| h.filename = Some(path.display().to_string()));
    Ok(image)
}
