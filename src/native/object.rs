use std::collections::BTreeMap;
use std::ffi::c_void;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use ndarray::Array3;
use tracing::{debug, trace};

use super::error::NativeError;
use super::progress::Progress;
use super::signal::{DestroyNotify, SignalCallback, SignalId, SignalTable};
use crate::types::{BandFormat, Phase, Value};

/// Identity of a native image object, stable for its lifetime.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct ImageId(u64);

static NEXT_IMAGE_ID: AtomicU64 = AtomicU64::new(1);

impl ImageId {
    fn next() -> Self {
        ImageId(NEXT_IMAGE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ImageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Largest width, height, band count or offset the engine accepts.
pub const MAX_COORD: usize = 10_000_000;

/// Rectangle of pixels, in image coordinates.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct TileRect {
    pub left: usize,
    pub top: usize,
    pub width: usize,
    pub height: usize,
}

impl TileRect {
    pub fn new(left: usize, top: usize, width: usize, height: usize) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn area(&self) -> usize {
        self.width.saturating_mul(self.height)
    }

    pub fn right(&self) -> usize {
        self.left.saturating_add(self.width)
    }

    pub fn bottom(&self) -> usize {
        self.top.saturating_add(self.height)
    }
}

impl std::fmt::Display for TileRect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}x{}+{}+{}",
            self.width, self.height, self.left, self.top
        )
    }
}

/// Computes the pixels of a region, shaped `(rows, cols, bands)`.
pub type PixelSource = Arc<dyn Fn(TileRect) -> Result<Array3<f64>, NativeError> + Send + Sync>;

/// Image header: geometry, format and metadata fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub width: usize,
    pub height: usize,
    pub bands: usize,
    pub format: BandFormat,
    /// Horizontal resolution, pixels per millimetre
    pub xres: f64,
    /// Vertical resolution, pixels per millimetre
    pub yres: f64,
    pub scale: f64,
    pub offset: f64,
    pub filename: Option<String>,
    /// Caller-defined fields
    pub fields: BTreeMap<String, Value>,
}

impl Header {
    pub fn new(width: usize, height: usize, bands: usize, format: BandFormat) -> Self {
        Self {
            width,
            height,
            bands,
            format,
            xres: 1.0,
            yres: 1.0,
            scale: 1.0,
            offset: 0.0,
            filename: None,
            fields: BTreeMap::new(),
        }
    }

    /// Same metadata, new geometry and format; used by derived images.
    pub fn derive(&self, width: usize, height: usize, bands: usize, format: BandFormat) -> Self {
        Self {
            width,
            height,
            bands,
            format,
            ..self.clone()
        }
    }

    pub fn contains(&self, rect: &TileRect) -> bool {
        let right = rect.left.checked_add(rect.width);
        let bottom = rect.top.checked_add(rect.height);
        rect.width > 0
            && rect.height > 0
            && right.is_some_and(|r| r <= self.width)
            && bottom.is_some_and(|b| b <= self.height)
    }
}

/// Engine-side image object. Callers hold it through [`NativeImage`].
pub struct ImageObject {
    id: ImageId,
    header: RwLock<Header>,
    source: PixelSource,
    progress: AtomicBool,
    signals: Mutex<SignalTable>,
}

impl Drop for ImageObject {
    fn drop(&mut self) {
        let slots = self
            .signals
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .drain();
        trace!(
            "Destroying image {} ({} signal slot(s) attached)",
            self.id,
            slots.len()
        );
        drop(slots);
    }
}

/// Counted reference to a native image object.
#[derive(Clone)]
pub struct NativeImage(Arc<ImageObject>);

impl NativeImage {
    pub fn new(header: Header, source: PixelSource) -> Self {
        let id = ImageId::next();
        trace!(
            "Creating image {}: {}x{} {} band(s) {}",
            id, header.width, header.height, header.bands, header.format
        );
        NativeImage(Arc::new(ImageObject {
            id,
            header: RwLock::new(header),
            source,
            progress: AtomicBool::new(false),
            signals: Mutex::new(SignalTable::default()),
        }))
    }

    /// Take a new reference to an object the engine passed by pointer.
    ///
    /// # Safety
    /// `ptr` must come from [`NativeImage::as_ptr`] on an object that is still
    /// alive for the duration of this call.
    pub unsafe fn from_borrowed_ptr(ptr: *const ImageObject) -> Self {
        // SAFETY: caller guarantees `ptr` is a live `Arc<ImageObject>` pointer.
        unsafe {
            Arc::increment_strong_count(ptr);
            NativeImage(Arc::from_raw(ptr))
        }
    }

    pub fn as_ptr(&self) -> *const ImageObject {
        Arc::as_ptr(&self.0)
    }

    pub fn id(&self) -> ImageId {
        self.0.id
    }

    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    pub fn header(&self) -> Header {
        self.0
            .header
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn with_header<R>(&self, f: impl FnOnce(&Header) -> R) -> R {
        f(&self.0.header.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn update_header<R>(&self, f: impl FnOnce(&mut Header) -> R) -> R {
        f(&mut self.0.header.write().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn width(&self) -> usize {
        self.with_header(|h| h.width)
    }

    pub fn height(&self) -> usize {
        self.with_header(|h| h.height)
    }

    pub fn bands(&self) -> usize {
        self.with_header(|h| h.bands)
    }

    pub fn format(&self) -> BandFormat {
        self.with_header(|h| h.format)
    }

    /// Compute a region. The region must lie inside the image.
    pub fn generate(&self, rect: TileRect) -> Result<Array3<f64>, NativeError> {
        let (inside, width, height) = self.with_header(|h| (h.contains(&rect), h.width, h.height));
        if !inside {
            return Err(NativeError::OutOfBounds {
                rect,
                width,
                height,
            });
        }
        (self.0.source)(rect)
    }

    pub fn set_progress(&self, enabled: bool) {
        self.0.progress.store(enabled, Ordering::SeqCst);
    }

    pub fn progress_enabled(&self) -> bool {
        self.0.progress.load(Ordering::SeqCst)
    }

    /// Install `callback` on `signal`. Fails if the slot is already occupied,
    /// in which case `user_data` is left untouched and still owned by the
    /// caller.
    pub fn signal_connect(
        &self,
        signal: &str,
        callback: SignalCallback,
        user_data: *mut c_void,
        destroy: Option<DestroyNotify>,
    ) -> Result<SignalId, NativeError> {
        let name = Phase::from_signal_name(signal)
            .map(Phase::signal_name)
            .ok_or_else(|| NativeError::UnknownSignal(signal.to_string()))?;
        let mut table = self.0.signals.lock().unwrap_or_else(PoisonError::into_inner);
        let id = table
            .connect(name, callback, user_data, destroy)
            .ok_or_else(|| NativeError::SlotOccupied {
                signal: name.to_string(),
                image: self.id(),
            })?;
        debug!("Connected signal \"{}\" on image {}", name, self.id());
        Ok(id)
    }

    /// Remove a slot. Returns false if `id` is not connected on this object.
    pub fn signal_disconnect(&self, id: SignalId) -> bool {
        let slot = self
            .0
            .signals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take(id);
        // Destroy notify may run here, outside the table lock.
        slot.is_some()
    }

    pub fn signal_connected(&self, signal: &str) -> bool {
        match Phase::from_signal_name(signal) {
            Some(phase) => self
                .0
                .signals
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .is_connected(phase.signal_name()),
            None => false,
        }
    }

    /// Fire `signal` with the current statistics.
    pub(crate) fn emit(&self, phase: Phase, progress: &Progress) {
        let slot = self
            .0
            .signals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(phase.signal_name());
        if let Some(slot) = slot {
            slot.invoke(self.as_ptr(), progress);
        }
    }
}

impl PartialEq for NativeImage {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl std::fmt::Debug for NativeImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.with_header(|h| {
            f.debug_struct("NativeImage")
                .field("id", &self.id())
                .field("width", &h.width)
                .field("height", &h.height)
                .field("bands", &h.bands)
                .field("format", &h.format)
                .finish()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zeros(width: usize, height: usize) -> NativeImage {
        NativeImage::new(
            Header::new(width, height, 1, BandFormat::UChar),
            Arc::new(|r: TileRect| Ok(Array3::zeros((r.height, r.width, 1)))),
        )
    }

    #[test]
    fn generate_rejects_regions_outside_image() {
        let im = zeros(4, 4);
        assert!(im.generate(TileRect::new(0, 0, 4, 4)).is_ok());
        assert!(matches!(
            im.generate(TileRect::new(2, 2, 4, 1)),
            Err(NativeError::OutOfBounds { .. })
        ));
        assert!(im.generate(TileRect::new(0, 0, 0, 1)).is_err());
    }

    #[test]
    fn borrowed_pointer_takes_a_reference() {
        let im = zeros(2, 2);
        let other = unsafe { NativeImage::from_borrowed_ptr(im.as_ptr()) };
        assert_eq!(im.ref_count(), 2);
        assert_eq!(other, im);
        drop(other);
        assert_eq!(im.ref_count(), 1);
    }

    #[test]
    fn unknown_signal_is_refused() {
        extern "C" fn noop(_: *const ImageObject, _: *const Progress, _: *mut c_void) {}
        let im = zeros(1, 1);
        assert!(matches!(
            im.signal_connect("close", noop, std::ptr::null_mut(), None),
            Err(NativeError::UnknownSignal(_))
        ));
        let id = im
            .signal_connect("eval", noop, std::ptr::null_mut(), None)
            .unwrap();
        assert!(im.signal_connected("eval"));
        assert!(im.signal_disconnect(id));
        assert!(!im.signal_disconnect(id));
        assert!(!im.signal_connected("eval"));
    }
}
