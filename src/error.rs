//! Error types for sparsekv
//!
//! Provides a unified error type for all operations.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using SparseKvError
pub type Result<T> = std::result::Result<T, SparseKvError>;

/// Unified error type for sparsekv operations
#[derive(Debug, Error)]
pub enum SparseKvError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    /// A segment or index file does not have the expected shape, or a
    /// segment and its index have drifted apart on disk.
    #[error("Corrupt file {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Key not found")]
    KeyNotFound,

    // -------------------------------------------------------------------------
    // Input Errors
    // -------------------------------------------------------------------------
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SparseKvError {
    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
