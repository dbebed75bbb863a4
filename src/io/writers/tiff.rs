use std::fs::File;
use std::path::Path;

use tiff::encoder::{TiffEncoder, colortype};

use crate::native::NativeError;

/// Sample layout of a TIFF strip buffer.
pub enum TiffSamples<'a> {
    U8(&'a [u8]),
    U16(&'a [u16]),
    F32(&'a [f32]),
}

pub fn write_tiff(
    output: &Path,
    cols: usize,
    rows: usize,
    bands: usize,
    samples: TiffSamples<'_>,
) -> Result<(), NativeError> {
    let encode_err = |reason: String| NativeError::Encode {
        path: output.display().to_string(),
        reason,
    };
    let (w, h) = (cols as u32, rows as u32);
    let file = File::create(output)?;
    let mut encoder = TiffEncoder::new(file).map_err(|e| encode_err(e.to_string()))?;

    let written = match (bands, samples) {
        (1, TiffSamples::U8(d)) => encoder.write_image::<colortype::Gray8>(w, h, d),
        (3, TiffSamples::U8(d)) => encoder.write_image::<colortype::RGB8>(w, h, d),
        (4, TiffSamples::U8(d)) => encoder.write_image::<colortype::RGBA8>(w, h, d),
        (1, TiffSamples::U16(d)) => encoder.write_image::<colortype::Gray16>(w, h, d),
        (3, TiffSamples::U16(d)) => encoder.write_image::<colortype::RGB16>(w, h, d),
        (4, TiffSamples::U16(d)) => encoder.write_image::<colortype::RGBA16>(w, h, d),
        (1, TiffSamples::F32(d)) => encoder.write_image::<colortype::Gray32Float>(w, h, d),
        (3, TiffSamples::F32(d)) => encoder.write_image::<colortype::RGB32Float>(w, h, d),
        (4, TiffSamples::F32(d)) => encoder.write_image::<colortype::RGBA32Float>(w, h, d),
        (n, _) => {
            return Err(NativeError::UnsupportedFormat(format!(
                "TIFF with {} band(s)",
                n
            )));
        }
    };
    written.map_err(|e| encode_err(e.to_string()))
}
