//! Command Line Interface (CLI) layer for tilevips.
//!
//! This module defines argument parsing (`args`), error types (`errors`),
//! and the subcommand logic (`runner`): the `info` and `progress` smoke
//! checks, the `bench` construction timing loop, and the `ops` catalog dump.
//!
//! If you are embedding tilevips into another application, use the library
//! API (`tilevips::Image`) instead of calling the CLI code.
pub mod args;
pub mod errors;
pub mod runner;

pub use args::CliArgs;
pub use runner::run;
