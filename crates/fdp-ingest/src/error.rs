//! Error types for the ingestion pipeline
//!
//! Messages are user-facing: each names the failing input and, where there is
//! one, the action that fixes it.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for ingest operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Errors raised while selecting, streaming, and merging snapshots
#[derive(Error, Debug)]
pub enum IngestError {
    /// Required configuration is missing or unusable
    #[error("Configuration error: {0}")]
    Config(String),

    /// A table's source directory holds no dated snapshot
    #[error("No dated snapshot found for table '{table}' under '{}'. Expected a file named like '<table>_<YYYYMMDD>.csv.gz'.", .dir.display())]
    SnapshotNotFound { table: String, dir: PathBuf },

    /// The schema manifest has no entry for a table being ingested
    #[error("No schema entry for table '{0}'. Regenerate the schema manifest so every selected table is described.")]
    SchemaMissing(String),

    /// The identifier column is absent from a snapshot header
    #[error("Identifier column '{column}' not found in the header of '{file}'")]
    IdentifierColumnMissing { column: String, file: String },

    /// A value matched neither its declared type nor the text fallback
    #[error("Cannot coerce '{value}' in column '{column}' to {declared}")]
    Coercion {
        value: String,
        column: String,
        declared: String,
    },

    /// A document, history, checkpoint, or manifest write failed
    #[error("Failed to persist {what} at '{}': {source}", .path.display())]
    Persistence {
        what: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed CSV row or stream
    #[error("CSV error in '{file}': {source}")]
    Csv {
        file: String,
        #[source]
        source: csv::Error,
    },

    /// An ingestion worker panicked instead of reporting a result
    #[error("Ingestion worker {0} panicked")]
    WorkerPanic(usize),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Common(#[from] fdp_common::FdpError),
}

impl IngestError {
    /// Configuration error with a custom message
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Persistence failure for a named artifact
    pub fn persistence(
        what: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::Persistence {
            what,
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_not_found_names_table_and_dir() {
        let err = IngestError::SnapshotNotFound {
            table: "equity".to_string(),
            dir: PathBuf::from("/data/src/equity"),
        };
        let message = err.to_string();
        assert!(message.contains("equity"));
        assert!(message.contains("/data/src/equity"));
        assert!(message.contains("csv.gz"));
    }

    #[test]
    fn test_persistence_names_artifact() {
        let source = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = IngestError::persistence("checkpoint", "/data/dest/checkpoint.json", source);
        let message = err.to_string();
        assert!(message.contains("checkpoint"));
        assert!(message.contains("/data/dest/checkpoint.json"));
    }

    #[test]
    fn test_coercion_message_shape() {
        let err = IngestError::Coercion {
            value: "--".to_string(),
            column: "PX_LAST".to_string(),
            declared: "float".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Cannot coerce '--' in column 'PX_LAST' to float"
        );
    }
}
