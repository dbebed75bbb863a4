//! Progress event adapter.
//!
//! The engine reports evaluation progress through one native callback per
//! signal per image. [`ProgressAdapter`] installs a single trampoline for each
//! of `preeval`, `eval` and `posteval` on a tracked image and fans every
//! firing out to the handlers registered for that phase, in order, with an
//! immutable [`ProgressSnapshot`].
pub mod adapter;
pub mod snapshot;

pub use adapter::{HandlerError, HandlerResult, ProgressAdapter, RegistrationToken};
pub use snapshot::ProgressSnapshot;
