use std::path::Path;

use image::{DynamicImage, ImageBuffer, ImageFormat};

use crate::native::NativeError;

/// Sample layout of a PNG buffer.
pub enum PngSamples {
    U8(Vec<u8>),
    U16(Vec<u16>),
}

pub fn write_png(
    output: &Path,
    cols: usize,
    rows: usize,
    bands: usize,
    samples: PngSamples,
) -> Result<(), NativeError> {
    let (w, h) = (cols as u32, rows as u32);
    let dynamic = match (bands, samples) {
        (1, PngSamples::U8(d)) => ImageBuffer::from_raw(w, h, d).map(DynamicImage::ImageLuma8),
        (2, PngSamples::U8(d)) => ImageBuffer::from_raw(w, h, d).map(DynamicImage::ImageLumaA8),
        (3, PngSamples::U8(d)) => ImageBuffer::from_raw(w, h, d).map(DynamicImage::ImageRgb8),
        (4, PngSamples::U8(d)) => ImageBuffer::from_raw(w, h, d).map(DynamicImage::ImageRgba8),
        (1, PngSamples::U16(d)) => ImageBuffer::from_raw(w, h, d).map(DynamicImage::ImageLuma16),
        (2, PngSamples::U16(d)) => ImageBuffer::from_raw(w, h, d).map(DynamicImage::ImageLumaA16),
        (3, PngSamples::U16(d)) => ImageBuffer::from_raw(w, h, d).map(DynamicImage::ImageRgb16),
        (4, PngSamples::U16(d)) => ImageBuffer::from_raw(w, h, d).map(DynamicImage::ImageRgba16),
        (n, _) => {
            return Err(NativeError::UnsupportedFormat(format!(
                "PNG with {} band(s)",
                n
            )));
        }
    };
    let encode_err = |reason: String| NativeError::Encode {
        path: output.display().to_string(),
        reason,
    };
    let dynamic = dynamic.ok_or_else(|| encode_err("buffer size does not match geometry".into()))?;
    dynamic
        .save_with_format(output, ImageFormat::Png)
        .map_err(|e| encode_err(e.to_string()))
}
