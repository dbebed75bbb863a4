//! Tile-by-tile evaluation of an image.
//!
//! One call to [`realize`] is one evaluation pass. With the object's progress
//! flag set, the pass emits `preeval` before the first tile, `eval` after
//! every tile and `posteval` once at the end, failed passes included.
use std::time::Instant;

use ndarray::{Array3, s};
use tracing::trace;

use super::error::NativeError;
use super::object::{NativeImage, TileRect};
use super::progress::Progress;
use crate::types::Phase;

/// Evaluate `image` using the configured tile height.
pub fn realize<F>(image: &NativeImage, consume: F) -> Result<(), NativeError>
where
    F: FnMut(TileRect, &Array3<f64>) -> Result<(), NativeError>,
{
    realize_with(image, crate::config::current().tile_height, consume)
}

/// Evaluate `image` in strips of `tile_height` rows, top to bottom, handing
/// each computed strip to `consume`.
pub fn realize_with<F>(
    image: &NativeImage,
    tile_height: usize,
    mut consume: F,
) -> Result<(), NativeError>
where
    F: FnMut(TileRect, &Array3<f64>) -> Result<(), NativeError>,
{
    let (width, height) = (image.width(), image.height());
    let tpels = width
        .checked_mul(height)
        .and_then(|n| i64::try_from(n).ok())
        .ok_or_else(|| {
            NativeError::Processing(format!("{}x{} image is too large to evaluate", width, height))
        })?;
    let tile_height = tile_height.max(1);
    let report = image.progress_enabled();
    let timer = Instant::now();
    let mut progress = Progress::start(tpels);

    trace!(
        "Evaluating image {} in {}-row tiles (progress: {})",
        image.id(),
        tile_height,
        report
    );

    if report {
        image.emit(Phase::PreEval, &progress);
    }

    let mut result = Ok(());
    for top in (0..height).step_by(tile_height) {
        let rect = TileRect::new(0, top, width, tile_height.min(height - top));
        result = image.generate(rect).and_then(|tile| consume(rect, &tile));
        if result.is_err() {
            break;
        }
        progress.update(rect.area() as i64, timer.elapsed());
        if report {
            image.emit(Phase::Eval, &progress);
        }
    }

    if report {
        image.emit(Phase::PostEval, &progress);
    }
    result
}

/// Evaluate the whole image into one array.
pub fn to_array(image: &NativeImage) -> Result<Array3<f64>, NativeError> {
    let mut out = Array3::zeros((image.height(), image.width(), image.bands()));
    realize(image, |rect, tile| {
        out.slice_mut(s![rect.top..rect.bottom(), rect.left..rect.right(), ..])
            .assign(tile);
        Ok(())
    })?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::Header;
    use crate::types::BandFormat;
    use std::sync::Arc;

    fn ramp(width: usize, height: usize) -> NativeImage {
        NativeImage::new(
            Header::new(width, height, 1, BandFormat::Double),
            Arc::new(|r: TileRect| {
                Ok(Array3::from_shape_fn((r.height, r.width, 1), |(y, x, _)| {
                    ((r.top + y) * 10 + r.left + x) as f64
                }))
            }),
        )
    }

    #[test]
    fn strips_cover_image_top_to_bottom() {
        let im = ramp(3, 7);
        let mut tops = Vec::new();
        realize_with(&im, 3, |rect, tile| {
            assert_eq!(tile.dim(), (rect.height, 3, 1));
            tops.push((rect.top, rect.height));
            Ok(())
        })
        .unwrap();
        assert_eq!(tops, vec![(0, 3), (3, 3), (6, 1)]);
    }

    #[test]
    fn overflowing_pixel_count_fails_without_reading() {
        let im = NativeImage::new(
            Header::new(usize::MAX, 2, 1, BandFormat::UChar),
            Arc::new(|_: TileRect| Err(NativeError::Processing("read".into()))),
        );
        let mut calls = 0;
        let err = realize_with(&im, 1, |_, _| {
            calls += 1;
            Ok(())
        })
        .unwrap_err();
        assert!(err.to_string().contains("too large"), "{}", err);
        assert_eq!(calls, 0);
    }

    #[test]
    fn consumer_error_stops_the_pass() {
        let im = ramp(2, 10);
        let mut calls = 0;
        let err = realize_with(&im, 2, |rect, _| {
            calls += 1;
            if rect.top == 4 {
                Err(NativeError::Processing("disk full".into()))
            } else {
                Ok(())
            }
        });
        assert!(err.is_err());
        assert_eq!(calls, 3);
    }

    #[test]
    fn to_array_assembles_tiles() {
        let im = ramp(4, 5);
        let arr = to_array(&im).unwrap();
        assert_eq!(arr.dim(), (5, 4, 1));
        assert_eq!(arr[[4, 3, 0]], 43.0);
        assert_eq!(arr[[0, 0, 0]], 0.0);
    }
}
