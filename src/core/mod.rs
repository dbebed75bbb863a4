//! Core building blocks consumed by the high-level `api` module: the
//! multi-handler progress adapter and the operation catalog.
pub mod operation;
pub mod progress;
