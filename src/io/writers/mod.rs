//! File savers. The output format is chosen from the file suffix, and the
//! image is evaluated in one pass before encoding.
pub mod jpeg;
pub mod png;
pub mod tiff;

use std::path::Path;

use ndarray::Array3;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::native::{NativeError, NativeImage, eval};
use crate::types::BandFormat;

use self::png::PngSamples;
use self::tiff::TiffSamples;

/// Options for writing an image file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveOptions {
    /// JPEG quality factor, 1 to 100
    pub quality: u8,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self { quality: 75 }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum SaveFormat {
    Png,
    Jpeg,
    Tiff,
}

impl SaveFormat {
    pub fn from_path(path: &Path) -> Result<Self, NativeError> {
        let suffix = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match suffix.as_str() {
            "png" => Ok(SaveFormat::Png),
            "jpg" | "jpeg" => Ok(SaveFormat::Jpeg),
            "tif" | "tiff" => Ok(SaveFormat::Tiff),
            _ => Err(NativeError::UnsupportedFormat(format!(
                "no saver for \"{}\"",
                path.display()
            ))),
        }
    }

    fn supports_bands(self, bands: usize) -> bool {
        match self {
            SaveFormat::Png => (1..=4).contains(&bands),
            SaveFormat::Jpeg => bands == 1 || bands == 3,
            SaveFormat::Tiff => matches!(bands, 1 | 3 | 4),
        }
    }
}

fn to_u8(pixels: &Array3<f64>) -> Vec<u8> {
    pixels.iter().map(|&v| BandFormat::UChar.clip(v) as u8).collect()
}

fn to_u16(pixels: &Array3<f64>) -> Vec<u16> {
    pixels.iter().map(|&v| BandFormat::UShort.clip(v) as u16).collect()
}

fn to_f32(pixels: &Array3<f64>) -> Vec<f32> {
    pixels.iter().map(|&v| v as f32).collect()
}

/// Evaluate `image` and write it to `output`.
pub fn save(image: &NativeImage, output: &Path, options: &SaveOptions) -> Result<(), NativeError> {
    let kind = SaveFormat::from_path(output)?;
    let header = image.header();
    if !kind.supports_bands(header.bands) {
        return Err(NativeError::UnsupportedFormat(format!(
            "{:?} with {} band(s)",
            kind, header.bands
        )));
    }

    let pixels = eval::to_array(image)?;
    let (rows, cols, bands) = pixels.dim();

    match kind {
        SaveFormat::Png => {
            let samples = match header.format {
                BandFormat::UShort | BandFormat::Short => PngSamples::U16(to_u16(&pixels)),
                _ => PngSamples::U8(to_u8(&pixels)),
            };
            png::write_png(output, cols, rows, bands, samples)?;
        }
        SaveFormat::Jpeg => {
            let data = to_u8(&pixels);
            let quality = options.quality.clamp(1, 100);
            if bands == 1 {
                jpeg::write_gray_jpeg(output, cols, rows, &data, quality)?;
            } else {
                jpeg::write_rgb_jpeg(output, cols, rows, &data, quality)?;
            }
        }
        SaveFormat::Tiff => match header.format {
            BandFormat::UChar | BandFormat::Char => {
                tiff::write_tiff(output, cols, rows, bands, TiffSamples::U8(&to_u8(&pixels)))?
            }
            BandFormat::UShort | BandFormat::Short => {
                tiff::write_tiff(output, cols, rows, bands, TiffSamples::U16(&to_u16(&pixels)))?
            }
            _ => tiff::write_tiff(output, cols, rows, bands, TiffSamples::F32(&to_f32(&pixels)))?,
        },
    }

    info!(
        "Saved {} ({}x{}, {} band(s), {:?})",
        output.display(),
        cols,
        rows,
        bands,
        kind
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::load::{LoadOptions, load_file};
    use crate::native::ops;

    #[test]
    fn suffix_selects_format() {
        assert_eq!(SaveFormat::from_path(Path::new("a.PNG")).unwrap(), SaveFormat::Png);
        assert_eq!(SaveFormat::from_path(Path::new("a.jpeg")).unwrap(), SaveFormat::Jpeg);
        assert_eq!(SaveFormat::from_path(Path::new("a.tif")).unwrap(), SaveFormat::Tiff);
        assert!(matches!(
            SaveFormat::from_path(Path::new("a.webm")),
            Err(NativeError::UnsupportedFormat(_))
        ));
        assert!(SaveFormat::from_path(Path::new("noext")).is_err());
    }

    #[test]
    fn png_keeps_pixel_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("xy.png");
        let im = ops::cast(&ops::xyz(20, 10), BandFormat::UChar);
        save(&im, &path, &SaveOptions::default()).unwrap();

        let back = load_file(&path, &LoadOptions::default()).unwrap();
        assert_eq!((back.width(), back.height(), back.bands()), (20, 10, 2));
        assert_eq!(ops::max(&back).unwrap(), 19.0);
    }

    #[test]
    fn ushort_png_is_sixteen_bit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wide.png");
        let bright = ops::linear(&ops::black(4, 4, 1), &[1.0], &[1000.0]).unwrap();
        save(&ops::cast(&bright, BandFormat::UShort), &path, &SaveOptions::default()).unwrap();

        let back = load_file(&path, &LoadOptions::default()).unwrap();
        assert_eq!(back.format(), BandFormat::UShort);
        assert_eq!(ops::max(&back).unwrap(), 1000.0);
    }

    #[test]
    fn jpeg_round_trip_keeps_geometry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flat.jpg");
        save(&ops::black(32, 16, 3), &path, &SaveOptions { quality: 90 }).unwrap();

        let back = load_file(&path, &LoadOptions::default()).unwrap();
        assert_eq!((back.width(), back.height(), back.bands()), (32, 16, 3));
    }

    #[test]
    fn jpeg_rejects_two_bands_before_evaluating() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("xy.jpg");
        let err = save(&ops::xyz(4, 4), &path, &SaveOptions::default()).unwrap_err();
        assert!(matches!(err, NativeError::UnsupportedFormat(_)));
        assert!(!path.exists());
    }

    #[test]
    fn tiff_round_trip_keeps_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ramp.tif");
        let im = ops::cast(&ops::extract_band(&ops::xyz(9, 3), 0, 1).unwrap(), BandFormat::UChar);
        save(&im, &path, &SaveOptions::default()).unwrap();

        let back = load_file(&path, &LoadOptions::default()).unwrap();
        assert_eq!((back.width(), back.height()), (9, 3));
        assert_eq!(ops::max(&back).unwrap(), 8.0);
    }
}
