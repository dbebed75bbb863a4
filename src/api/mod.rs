//! High-level, ergonomic image handle. Wraps a counted reference to an engine
//! image and exposes construction, metadata, lazy operations, statistics,
//! file I/O and the progress registration surface. Prefer these entrypoints
//! over the `native` layer when integrating tilevips.
use std::fmt;
use std::path::Path;

use ndarray::Array3;

use crate::core::operation;
use crate::core::progress::{HandlerResult, ProgressAdapter, ProgressSnapshot, RegistrationToken};
use crate::error::{Error, Result};
use crate::io::{LoadOptions, SaveOptions};
use crate::native::{ImageId, MAX_COORD, NativeImage, TileRect, eval, ops};
use crate::types::{BandFormat, Phase, Value};

/// Header fields every image carries.
const BUILTIN_FIELDS: [&str; 9] = [
    "width", "height", "bands", "format", "xres", "yres", "scale", "offset", "filename",
];

/// Sizes must lie in `1..=MAX_COORD`.
fn positive(arg: &str, value: usize) -> Result<usize> {
    if value == 0 || value > MAX_COORD {
        return Err(Error::invalid(arg, value));
    }
    Ok(value)
}

/// Caller-side handle to an engine image. Cloning takes another reference to
/// the same image; equality is identity.
#[derive(Clone, PartialEq)]
pub struct Image {
    native: NativeImage,
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.native.with_header(|h| {
            write!(
                f,
                "Image({} {}x{} {} band(s) {})",
                self.native.id(),
                h.width,
                h.height,
                h.bands,
                h.format
            )
        })
    }
}

/// Adopt an engine reference, e.g. an image with a custom [`PixelSource`].
///
/// [`PixelSource`]: crate::native::PixelSource
impl From<NativeImage> for Image {
    fn from(native: NativeImage) -> Self {
        Image::from_native(native)
    }
}

impl Image {
    pub(crate) fn from_native(native: NativeImage) -> Self {
        Image { native }
    }

    /// The underlying engine reference.
    pub fn native(&self) -> &NativeImage {
        &self.native
    }

    pub fn id(&self) -> ImageId {
        self.native.id()
    }

    // Constructors

    /// All-zero `uchar` image.
    pub fn black(width: usize, height: usize, bands: usize) -> Result<Self> {
        Ok(Self::from_native(ops::black(
            positive("width", width)?,
            positive("height", height)?,
            positive("bands", bands)?,
        )))
    }

    /// Two-band `uint` image whose pixels hold their own x and y.
    pub fn xyz(width: usize, height: usize) -> Result<Self> {
        Ok(Self::from_native(ops::xyz(
            positive("width", width)?,
            positive("height", height)?,
        )))
    }

    /// Horizontal `float` ramp from 0 to 1.
    pub fn grey(width: usize, height: usize) -> Result<Self> {
        Ok(Self::from_native(ops::grey(
            positive("width", width)?,
            positive("height", height)?,
        )))
    }

    /// One-band `double` image from rows of numbers, with `scale` and
    /// `offset` recorded in the header.
    pub fn new_from_array(rows: &[Vec<f64>], scale: f64, offset: f64) -> Result<Self> {
        Ok(Self::from_native(ops::matrix(rows, scale, offset)?))
    }

    /// Wrap a `(height, width, bands)` array.
    pub fn new_from_memory(pixels: Array3<f64>, format: BandFormat) -> Result<Self> {
        let (height, width, bands) = pixels.dim();
        positive("width", width)?;
        positive("height", height)?;
        positive("bands", bands)?;
        Ok(Self::from_native(ops::memory(pixels, format)))
    }

    pub fn new_from_file(path: &Path, options: &LoadOptions) -> Result<Self> {
        Ok(Self::from_native(crate::io::load_file(path, options)?))
    }

    // Header

    pub fn width(&self) -> usize {
        self.native.width()
    }

    pub fn height(&self) -> usize {
        self.native.height()
    }

    pub fn bands(&self) -> usize {
        self.native.bands()
    }

    pub fn format(&self) -> BandFormat {
        self.native.format()
    }

    /// Read a header field, built-in or caller-set.
    pub fn get(&self, name: &str) -> Result<Value> {
        self.native.with_header(|h| {
            let value = match name {
                "width" => Value::Int(h.width as i64),
                "height" => Value::Int(h.height as i64),
                "bands" => Value::Int(h.bands as i64),
                "format" => Value::Str(h.format.name().to_string()),
                "xres" => Value::Double(h.xres),
                "yres" => Value::Double(h.yres),
                "scale" => Value::Double(h.scale),
                "offset" => Value::Double(h.offset),
                "filename" => match &h.filename {
                    Some(f) => Value::Str(f.clone()),
                    None => return Err(Error::invalid(name, "no such field")),
                },
                _ => match h.fields.get(name) {
                    Some(v) => v.clone(),
                    None => return Err(Error::invalid(name, "no such field")),
                },
            };
            Ok(value)
        })
    }

    /// Write a header field. Geometry and format are read-only.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let mismatch = |expected: &str, got: &Value| {
            Error::invalid(name, format!("{} ({} expected)", got, expected))
        };
        self.native.update_header(|h| {
            match name {
                "width" | "height" | "bands" | "format" => {
                    return Err(Error::invalid(name, "read-only field"));
                }
                "xres" | "yres" | "scale" | "offset" => {
                    let v = value.as_f64().ok_or_else(|| mismatch("double", &value))?;
                    match name {
                        "xres" => h.xres = v,
                        "yres" => h.yres = v,
                        "scale" => h.scale = v,
                        _ => h.offset = v,
                    }
                }
                "filename" => {
                    let v = value.as_str().ok_or_else(|| mismatch("str", &value))?;
                    h.filename = Some(v.to_string());
                }
                _ => {
                    h.fields.insert(name.to_string(), value.clone());
                }
            }
            Ok(())
        })
    }

    /// Names of the fields [`Image::get`] would answer.
    pub fn get_fields(&self) -> Vec<String> {
        self.native.with_header(|h| {
            BUILTIN_FIELDS
                .iter()
                .filter(|&&f| f != "filename" || h.filename.is_some())
                .map(|f| f.to_string())
                .chain(h.fields.keys().cloned())
                .collect()
        })
    }

    /// Drop a caller-set field. Built-ins cannot be removed.
    pub fn remove(&self, name: &str) -> bool {
        self.native
            .update_header(|h| h.fields.remove(name).is_some())
    }

    // Lazy operations

    /// `a * in + b`, per band when the arrays have one entry per band.
    pub fn linear(&self, a: &[f64], b: &[f64]) -> Result<Image> {
        Ok(Self::from_native(ops::linear(&self.native, a, b)?))
    }

    pub fn invert(&self) -> Image {
        Self::from_native(ops::invert(&self.native))
    }

    pub fn cast(&self, format: BandFormat) -> Image {
        Self::from_native(ops::cast(&self.native, format))
    }

    pub fn extract_area(&self, area: TileRect) -> Result<Image> {
        for (arg, offset) in [("left", area.left), ("top", area.top)] {
            if offset > MAX_COORD {
                return Err(Error::invalid(arg, offset));
            }
        }
        positive("width", area.width)?;
        positive("height", area.height)?;
        Ok(Self::from_native(ops::extract_area(&self.native, area)?))
    }

    pub fn extract_band(&self, band: usize, n: usize) -> Result<Image> {
        Ok(Self::from_native(ops::extract_band(&self.native, band, n)?))
    }

    pub fn resize(&self, scale: f64) -> Result<Image> {
        if !(scale.is_finite() && scale > 0.0)
            || ops::resize_dimensions(self.width(), self.height(), scale).is_none()
        {
            return Err(Error::invalid("scale", scale));
        }
        Ok(Self::from_native(ops::resize(&self.native, scale)?))
    }

    // Evaluation

    pub fn max(&self) -> Result<f64> {
        Ok(ops::max(&self.native)?)
    }

    pub fn min(&self) -> Result<f64> {
        Ok(ops::min(&self.native)?)
    }

    pub fn avg(&self) -> Result<f64> {
        Ok(ops::avg(&self.native)?)
    }

    /// Evaluate every pixel into a `(height, width, bands)` array.
    pub fn to_array(&self) -> Result<Array3<f64>> {
        Ok(eval::to_array(&self.native)?)
    }

    /// Evaluate once into a memory image with the same header.
    pub fn copy_memory(&self) -> Result<Image> {
        Ok(Self::from_native(ops::copy_memory(&self.native)?))
    }

    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        self.write_to_file_with(path, &SaveOptions::default())
    }

    pub fn write_to_file_with(&self, path: &Path, options: &SaveOptions) -> Result<()> {
        Ok(crate::io::save(&self.native, path, options)?)
    }

    /// Run a catalog operation with this image as the first argument.
    pub fn call(&self, name: &str, args: &[Value], options: &[(&str, Value)]) -> Result<Value> {
        let mut all = Vec::with_capacity(args.len() + 1);
        all.push(Value::Image(self.clone()));
        all.extend_from_slice(args);
        operation::call(name, &all, options)
    }

    // Progress, via the process-wide adapter

    /// Turn progress reporting on or off. Turning it off releases every
    /// handler registered for this image.
    pub fn set_progress(&self, enabled: bool) -> Result<()> {
        let adapter = ProgressAdapter::global();
        if enabled {
            adapter.enable_progress(self)
        } else {
            adapter.disable_progress(self);
            Ok(())
        }
    }

    /// Register `handler` for `phase`. Progress must be enabled first.
    /// Use the handler's `&Image` argument rather than capturing a clone of
    /// `self`, which would keep the image alive (see [`ProgressAdapter::register`]).
    pub fn signal_connect<F>(&self, phase: Phase, handler: F) -> Result<RegistrationToken>
    where
        F: Fn(&Image, &ProgressSnapshot) -> HandlerResult + Send + Sync + 'static,
    {
        ProgressAdapter::global().register(self, phase, handler)
    }

    pub fn signal_disconnect(&self, token: RegistrationToken) -> bool {
        ProgressAdapter::global().unregister(token)
    }
}
