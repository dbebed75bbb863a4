//! I/O layer: decoding image files into engine images and encoding evaluated
//! images to PNG, JPEG and TIFF.
pub mod load;
pub use load::{LoadOptions, load_file};

pub mod writers;
pub use writers::{SaveFormat, SaveOptions, save};
