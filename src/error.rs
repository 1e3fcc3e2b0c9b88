//! Error types for SnapKV
//!
//! Provides a unified error type for all operations.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Result type alias using SnapError
pub type Result<T> = std::result::Result<T, SnapError>;

/// Unified error type for SnapKV operations
///
/// `Clone` so that a single failed initialization can be reported to every
/// caller that was waiting on it.
#[derive(Debug, Clone, Error)]
pub enum SnapError {
    // -------------------------------------------------------------------------
    // Record Errors
    // -------------------------------------------------------------------------
    #[error("Record already exists: {key}")]
    AlreadyExists { key: String },

    #[error("Record not found: {key}")]
    NotFound { key: String },

    // -------------------------------------------------------------------------
    // Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("Store already initialized for {}", .path.display())]
    AlreadyInitialized { path: PathBuf },

    #[error("Watcher error: {0}")]
    Watcher(String),

    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[source] Arc<std::io::Error>),

    // -------------------------------------------------------------------------
    // Snapshot Errors
    // -------------------------------------------------------------------------
    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Compress error: {0}")]
    Compress(String),

    #[error("Decompress error: {0}")]
    Decompress(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<std::io::Error> for SnapError {
    fn from(err: std::io::Error) -> Self {
        SnapError::Io(Arc::new(err))
    }
}

impl SnapError {
    /// True for the record-level errors returned by CRUD operations
    pub fn is_record_error(&self) -> bool {
        matches!(self, SnapError::AlreadyExists { .. } | SnapError::NotFound { .. })
    }
}
