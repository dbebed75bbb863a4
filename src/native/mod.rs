//! Native engine layer: the C-style surface the binding is written against.
//!
//! Images are reference-counted objects (`NativeImage`) with a header, a lazy
//! tile source, a progress flag and a signal table. A signal slot holds one
//! `extern "C"` callback plus an opaque user-data pointer and optional destroy
//! notify, exactly one per (object, signal name). Pixel work happens in
//! `eval::realize`, which walks tiles top-to-bottom and emits the
//! `preeval`/`eval`/`posteval` signals when the object's progress flag is set.
pub mod error;
pub mod eval;
pub mod object;
pub mod ops;
pub mod progress;
pub mod signal;

pub use error::NativeError;
pub use object::{Header, ImageId, ImageObject, MAX_COORD, NativeImage, PixelSource, TileRect};
pub use progress::Progress;
pub use signal::{DestroyNotify, SignalCallback, SignalId};
