use clap::{Parser, Subcommand};
use std::path::PathBuf;

use tilevips::Access;

#[derive(Parser)]
#[command(name = "tilevips", version, about = "tilevips CLI")]
pub struct CliArgs {
    /// Enable logging
    #[arg(long, global = true, default_value_t = false)]
    pub log: bool,

    /// JSON configuration file (tile height, progress policies)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the library version and the properties of two synthetic images
    Info,

    /// Copy an image file to another format, reporting evaluation progress
    Progress {
        /// Input image file
        input: PathBuf,

        /// Output filename; the suffix picks the saver (png, jpg, tif)
        output: PathBuf,

        /// Pixel access pattern for the loader
        #[arg(long, value_enum, default_value_t = Access::Sequential)]
        access: Access,

        /// JPEG quality factor
        #[arg(long, default_value_t = 75)]
        quality: u8,
    },

    /// Time repeated construction of a small black image
    Bench {
        /// Constructions per run
        #[arg(long, default_value_t = 10_000)]
        loops: usize,

        /// Number of timed runs
        #[arg(long, default_value_t = 5)]
        runs: usize,
    },

    /// Print the operation catalog, or one operation, as JSON
    Ops {
        /// Operation name
        name: Option<String>,
    },
}
