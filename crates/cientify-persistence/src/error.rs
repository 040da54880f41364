//! Persistence error types.

use std::path::PathBuf;
use thiserror::Error;

/// Storage operation error.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// File I/O error.
    #[error("Failed to {operation} storage file: {path}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Atomic write failed (temp file couldn't be renamed).
    #[error("Failed to complete storage write")]
    AtomicWriteFailed {
        temp_path: PathBuf,
        target_path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No storage directory is available; the store is memory-only.
    #[error("No storage directory available")]
    NoStorageDir,
}

impl PersistenceError {
    /// Get a user-friendly message for this error.
    pub fn user_message(&self) -> String {
        match self {
            Self::Io {
                operation, path, ..
            } => {
                format!("Could not {} the storage file at {}", operation, path.display())
            }
            Self::AtomicWriteFailed { target_path, .. } => {
                format!(
                    "Could not save data to {}. Please check disk space and permissions.",
                    target_path.display()
                )
            }
            Self::NoStorageDir => {
                "No storage location is available; changes will not survive a restart."
                    .to_string()
            }
        }
    }
}

/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, PersistenceError>;
