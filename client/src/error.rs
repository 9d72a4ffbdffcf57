//! Unified error handling for the CLI.

use crate::config::ConfigError;

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Engine(#[from] tally_engine::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not signed in. Run `tally login --token <TOKEN>` first.")]
    SignedOut,

    #[error("Unsupported photo type: {0}")]
    UnsupportedPhoto(String),
}

/// Result type alias for commands.
pub type Result<T> = std::result::Result<T, AppError>;
