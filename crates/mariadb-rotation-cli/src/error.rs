//! CLI error types.

use std::path::PathBuf;

use mariadb_rotation::RotationError;
use thiserror::Error;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// The rotation library reported a failure.
    #[error("{0}")]
    Rotation(#[from] RotationError),

    /// A state or payload file could not be read or written.
    #[error("{path}: {source}")]
    File {
        /// File involved.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A state file is not valid JSON for its schema.
    #[error("invalid state file {path}: {reason}")]
    InvalidState {
        /// File involved.
        path: PathBuf,
        /// Parse failure.
        reason: String,
    },

    /// Output formatting error.
    #[error("format error: {0}")]
    Format(String),

    /// Writing to stdout failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Stable code for scripting, matching the library's codes where possible.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Rotation(e) => e.code(),
            Self::File { .. } | Self::Io(_) => "io_error",
            Self::InvalidState { .. } => "invalid_state",
            Self::Format(_) => "format_error",
        }
    }
}

/// Result alias for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;
