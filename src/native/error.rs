use thiserror::Error;

use super::object::{ImageId, TileRect};

/// Errors reported by the native engine
#[derive(Debug, Error)]
pub enum NativeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unable to decode {path}: {reason}")]
    Decode { path: String, reason: String },
    #[error("Unable to encode {path}: {reason}")]
    Encode { path: String, reason: String },
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("Out of order read at line {line}")]
    OutOfOrderRead { line: usize },
    #[error("Region {rect} lies outside image of {width}x{height}")]
    OutOfBounds {
        rect: TileRect,
        width: usize,
        height: usize,
    },
    #[error("Signal \"{signal}\" on image {image} already has a handler")]
    SlotOccupied { signal: String, image: ImageId },
    #[error("Unknown signal: {0}")]
    UnknownSignal(String),
    #[error("Processing error: {0}")]
    Processing(String),
}
