//! Error types for landmark persistence.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while reading or writing persisted landmarks.
#[derive(Error, Debug)]
pub enum FormatError {
    /// I/O error during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing or serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV parsing or serialization error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Sequence path does not identify a sequence
    #[error(transparent)]
    Identity(#[from] crate::model::IdentityError),

    /// Per-sequence record exists but cannot be used
    #[error("Malformed record {path:?}: {reason}")]
    MalformedRecord {
        /// Record file
        path: PathBuf,
        /// What is wrong with it
        reason: String,
    },

    /// Dataset table cell or row cannot be used
    #[error("Malformed table row in {path:?}: {reason}")]
    MalformedTable {
        /// Table file
        path: PathBuf,
        /// What is wrong with it
        reason: String,
    },

    /// Dataset table update failed after the record was written.
    /// The record has been rolled back to empty.
    #[error("Failed to update dataset table {table:?} (record rolled back): {source}")]
    TableWrite {
        /// Table file
        table: PathBuf,
        /// Underlying failure
        #[source]
        source: Box<FormatError>,
    },
}

impl FormatError {
    /// Create a malformed record error.
    pub fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a malformed table error.
    pub fn malformed_table(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::MalformedTable {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error means the record should be ignored rather than fail the caller.
    pub fn is_malformed_record(&self) -> bool {
        matches!(self, Self::MalformedRecord { .. })
    }
}
