//! Error types for dropsort operations

use std::path::PathBuf;
use thiserror::Error;

/// dropsort error types
#[derive(Error, Debug)]
pub enum SortError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Extraction failed for {}: {reason}", path.display())]
    Extraction { path: PathBuf, reason: String },

    #[error("No free destination name for {}", path.display())]
    MoveConflict { path: PathBuf },

    #[error("Move failed {} -> {}: {reason}", from.display(), to.display())]
    MoveFailure {
        from: PathBuf,
        to: PathBuf,
        reason: String,
    },

    #[error("File never settled after {attempts} checks: {}", path.display())]
    ReadinessTimeout { path: PathBuf, attempts: u32 },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for dropsort operations
pub type Result<T> = std::result::Result<T, SortError>;

impl From<serde_json::Error> for SortError {
    fn from(e: serde_json::Error) -> Self {
        SortError::Serialization(e.to_string())
    }
}

impl From<glob::PatternError> for SortError {
    fn from(e: glob::PatternError) -> Self {
        SortError::Config(format!("invalid glob pattern: {}", e))
    }
}
