//! Error types shared across FDP crates

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias used throughout the FDP workspace
pub type Result<T> = std::result::Result<T, FdpError>;

/// Errors raised by the shared utility layer
#[derive(Error, Debug)]
pub enum FdpError {
    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization or deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A file's digest did not match the recorded one
    #[error("Checksum mismatch for '{}': expected {expected}, got {actual}", .path.display())]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },
}
