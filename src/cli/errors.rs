use thiserror::Error;

/// Application-specific errors for the CLI
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{arg} must be greater than 0")]
    ZeroCount { arg: String },

    #[error("Unknown operation: {name}. Run `tilevips ops` for the list")]
    UnknownOperation { name: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Library(#[from] tilevips::Error),
}
