//! Engine operations: pixel generators, point and geometry operations, and
//! statistics. Derived images keep a reference to their input and compute
//! their tiles from the input's tiles on demand.
use std::sync::Arc;

use fast_image_resize::{FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer, images::Image};
use ndarray::{Array3, Zip, s};
use once_cell::sync::OnceCell;

use super::error::NativeError;
use super::eval::{realize, to_array};
use super::object::{Header, MAX_COORD, NativeImage, TileRect};
use crate::types::BandFormat;

/// All-zero image.
pub fn black(width: usize, height: usize, bands: usize) -> NativeImage {
    NativeImage::new(
        Header::new(width, height, bands, BandFormat::UChar),
        Arc::new(move |r: TileRect| Ok(Array3::zeros((r.height, r.width, bands)))),
    )
}

/// Two-band image where band 0 holds the x coordinate and band 1 the y
/// coordinate of each pixel.
pub fn xyz(width: usize, height: usize) -> NativeImage {
    NativeImage::new(
        Header::new(width, height, 2, BandFormat::UInt),
        Arc::new(|r: TileRect| {
            Ok(Array3::from_shape_fn((r.height, r.width, 2), |(y, x, b)| {
                if b == 0 {
                    (r.left + x) as f64
                } else {
                    (r.top + y) as f64
                }
            }))
        }),
    )
}

/// One-band float ramp, 0 at the left edge and 1 at the right edge.
pub fn grey(width: usize, height: usize) -> NativeImage {
    let span = width.saturating_sub(1).max(1) as f64;
    NativeImage::new(
        Header::new(width, height, 1, BandFormat::Float),
        Arc::new(move |r: TileRect| {
            Ok(Array3::from_shape_fn((r.height, r.width, 1), |(_, x, _)| {
                (r.left + x) as f64 / span
            }))
        }),
    )
}

/// Image over an existing pixel array shaped `(rows, cols, bands)`.
pub fn memory(pixels: Array3<f64>, format: BandFormat) -> NativeImage {
    let (height, width, bands) = pixels.dim();
    let pixels = Arc::new(pixels);
    NativeImage::new(
        Header::new(width, height, bands, format),
        Arc::new(move |r: TileRect| {
            Ok(pixels
                .slice(s![r.top..r.bottom(), r.left..r.right(), ..])
                .to_owned())
        }),
    )
}

/// One-band double matrix image, carrying `scale` and `offset` in its header.
pub fn matrix(rows: &[Vec<f64>], scale: f64, offset: f64) -> Result<NativeImage, NativeError> {
    let height = rows.len();
    let width = rows.first().map_or(0, Vec::len);
    if width == 0 || rows.iter().any(|row| row.len() != width) {
        return Err(NativeError::Processing(
            "matrix rows must be non-empty and of equal length".into(),
        ));
    }
    let pixels = Array3::from_shape_fn((height, width, 1), |(y, x, _)| rows[y][x]);
    let image = memory(pixels, BandFormat::Double);
    image.update_header(|h| {
        h.scale = scale;
        h.offset = offset;
    });
    Ok(image)
}

fn derived<F>(input: &NativeImage, header: Header, compute: F) -> NativeImage
where
    F: Fn(&NativeImage, TileRect) -> Result<Array3<f64>, NativeError> + Send + Sync + 'static,
{
    let input = input.clone();
    NativeImage::new(header, Arc::new(move |r: TileRect| compute(&input, r)))
}

/// `out = in * a + b`, per band. `a` and `b` hold one constant or one per
/// band. Output is float, or double for double input.
pub fn linear(input: &NativeImage, a: &[f64], b: &[f64]) -> Result<NativeImage, NativeError> {
    let header = input.header();
    for (name, consts) in [("a", a), ("b", b)] {
        if consts.is_empty() || (consts.len() != 1 && consts.len() != header.bands) {
            return Err(NativeError::Processing(format!(
                "linear: {} needs 1 or {} constants, got {}",
                name,
                header.bands,
                consts.len()
            )));
        }
    }
    let format = match header.format {
        BandFormat::Double => BandFormat::Double,
        _ => BandFormat::Float,
    };
    let (a, b) = (a.to_vec(), b.to_vec());
    let out = header.derive(header.width, header.height, header.bands, format);
    Ok(derived(input, out, move |input, r| {
        let mut tile = input.generate(r)?;
        Zip::indexed(&mut tile).for_each(|(_, _, band), v| {
            *v = *v * a[band % a.len()] + b[band % b.len()];
        });
        Ok(tile)
    }))
}

/// Photographic negative: `max - in` for unsigned formats, `-in` otherwise.
pub fn invert(input: &NativeImage) -> NativeImage {
    let header = input.header();
    let format = header.format;
    let out = header.clone();
    derived(input, out, move |input, r| {
        let tile = input.generate(r)?;
        Ok(if format.is_unsigned() {
            let max = format.range().1;
            tile.mapv(|v| max - v)
        } else {
            tile.mapv(|v| -v)
        })
    })
}

/// Convert to `format`, rounding and clipping to its range.
pub fn cast(input: &NativeImage, format: BandFormat) -> NativeImage {
    let header = input.header();
    let out = header.derive(header.width, header.height, header.bands, format);
    derived(input, out, move |input, r| {
        Ok(input.generate(r)?.mapv(|v| format.clip(v)))
    })
}

/// Crop out a rectangle.
pub fn extract_area(input: &NativeImage, area: TileRect) -> Result<NativeImage, NativeError> {
    let header = input.header();
    if !header.contains(&area) {
        return Err(NativeError::OutOfBounds {
            rect: area,
            width: header.width,
            height: header.height,
        });
    }
    let out = header.derive(area.width, area.height, header.bands, header.format);
    Ok(derived(input, out, move |input, r| {
        input.generate(TileRect::new(
            area.left + r.left,
            area.top + r.top,
            r.width,
            r.height,
        ))
    }))
}

/// Keep `n` bands starting at `band`.
pub fn extract_band(input: &NativeImage, band: usize, n: usize) -> Result<NativeImage, NativeError> {
    let header = input.header();
    if n == 0 || band.checked_add(n).is_none_or(|end| end > header.bands) {
        return Err(NativeError::Processing(format!(
            "extract_band: bands {}..{} not in image with {} band(s)",
            band,
            band.saturating_add(n),
            header.bands
        )));
    }
    let out = header.derive(header.width, header.height, n, header.format);
    Ok(derived(input, out, move |input, r| {
        Ok(input.generate(r)?.slice(s![.., .., band..band + n]).to_owned())
    }))
}

/// Output size for a resize by `scale`, never below one pixel. `None` when
/// either side would exceed [`MAX_COORD`].
pub fn resize_dimensions(width: usize, height: usize, scale: f64) -> Option<(usize, usize)> {
    let side = |n: usize| {
        let v = ((n as f64) * scale).round().max(1.0);
        (v <= MAX_COORD as f64).then_some(v as usize)
    };
    Some((side(width)?, side(height)?))
}

fn resize_band(
    data: Vec<f32>,
    cols: usize,
    rows: usize,
    target_cols: usize,
    target_rows: usize,
) -> Result<Vec<f32>, NativeError> {
    let resize_options =
        ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Lanczos3));
    let mut resizer = Resizer::new();

    let mut src_bytes = Vec::with_capacity(data.len() * 4);
    for v in data {
        src_bytes.extend_from_slice(&v.to_le_bytes());
    }
    let src_image = Image::from_vec_u8(cols as u32, rows as u32, src_bytes, PixelType::F32)
        .map_err(|e| NativeError::Processing(format!("resize: {}", e)))?;
    let mut dst_image = Image::new(target_cols as u32, target_rows as u32, PixelType::F32);
    resizer
        .resize(&src_image, &mut dst_image, &resize_options)
        .map_err(|e| NativeError::Processing(format!("resize: {}", e)))?;

    Ok(dst_image
        .into_vec()
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// Lanczos3 resize by `scale`. The input is computed in full the first time
/// any output tile is requested.
pub fn resize(input: &NativeImage, scale: f64) -> Result<NativeImage, NativeError> {
    if !(scale.is_finite() && scale > 0.0) {
        return Err(NativeError::Processing(format!(
            "resize: scale must be positive, got {}",
            scale
        )));
    }
    let header = input.header();
    let (cols, rows, bands) = (header.width, header.height, header.bands);
    let (target_cols, target_rows) = resize_dimensions(cols, rows, scale).ok_or_else(|| {
        NativeError::Processing(format!(
            "resize: {}x{} by {} exceeds the largest image size",
            cols, rows, scale
        ))
    })?;
    let format = header.format;
    let out = header.derive(target_cols, target_rows, bands, format);
    let cache: Arc<OnceCell<Array3<f64>>> = Arc::new(OnceCell::new());

    Ok(derived(input, out, move |input, r| {
        let full = cache.get_or_try_init(|| {
            let src = input.generate(TileRect::new(0, 0, cols, rows))?;
            let mut dst = Array3::zeros((target_rows, target_cols, bands));
            for band in 0..bands {
                let plane: Vec<f32> = src
                    .slice(s![.., .., band])
                    .iter()
                    .map(|&v| v as f32)
                    .collect();
                let resized = resize_band(plane, cols, rows, target_cols, target_rows)?;
                for (i, v) in resized.into_iter().enumerate() {
                    dst[[i / target_cols, i % target_cols, band]] = format.clip(v as f64);
                }
            }
            Ok::<_, NativeError>(dst)
        })?;
        Ok(full
            .slice(s![r.top..r.bottom(), r.left..r.right(), ..])
            .to_owned())
    }))
}

/// Largest pixel value over all bands. One evaluation pass.
pub fn max(image: &NativeImage) -> Result<f64, NativeError> {
    let mut best = f64::NEG_INFINITY;
    realize(image, |_, tile| {
        best = tile.fold(best, |acc, &v| acc.max(v));
        Ok(())
    })?;
    Ok(best)
}

/// Smallest pixel value over all bands. One evaluation pass.
pub fn min(image: &NativeImage) -> Result<f64, NativeError> {
    let mut best = f64::INFINITY;
    realize(image, |_, tile| {
        best = tile.fold(best, |acc, &v| acc.min(v));
        Ok(())
    })?;
    Ok(best)
}

/// Mean pixel value over all bands. One evaluation pass.
pub fn avg(image: &NativeImage) -> Result<f64, NativeError> {
    let mut sum = 0.0;
    let mut count = 0usize;
    realize(image, |_, tile| {
        sum += tile.sum();
        count += tile.len();
        Ok(())
    })?;
    Ok(if count == 0 { 0.0 } else { sum / count as f64 })
}

/// Evaluate into memory and return a new image over the result.
pub fn copy_memory(image: &NativeImage) -> Result<NativeImage, NativeError> {
    let header = image.header();
    let pixels = to_array(image)?;
    let copy = memory(pixels, header.format);
    copy.update_header(|h| *h = header);
    Ok(copy)
}
