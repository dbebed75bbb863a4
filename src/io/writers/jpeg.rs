use jpeg_encoder::{ColorType, Encoder};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::native::NativeError;

fn encode(
    output: &Path,
    cols: usize,
    rows: usize,
    data: &[u8],
    color: ColorType,
    quality: u8,
) -> Result<(), NativeError> {
    let encode_err = |reason: String| NativeError::Encode {
        path: output.display().to_string(),
        reason,
    };
    let (w, h) = match (u16::try_from(cols), u16::try_from(rows)) {
        (Ok(w), Ok(h)) => (w, h),
        _ => return Err(encode_err(format!("{}x{} exceeds JPEG limits", cols, rows))),
    };
    let file = File::create(output)?;
    let mut writer = BufWriter::new(file);
    let encoder = Encoder::new(&mut writer, quality);
    encoder
        .encode(data, w, h, color)
        .map_err(|e| encode_err(e.to_string()))?;
    Ok(())
}

pub fn write_gray_jpeg(
    output: &Path,
    cols: usize,
    rows: usize,
    data: &[u8],
    quality: u8,
) -> Result<(), NativeError> {
    encode(output, cols, rows, data, ColorType::Luma, quality)
}

pub fn write_rgb_jpeg(
    output: &Path,
    cols: usize,
    rows: usize,
    rgb_data: &[u8],
    quality: u8,
) -> Result<(), NativeError> {
    encode(output, cols, rows, rgb_data, ColorType::Rgb, quality)
}
