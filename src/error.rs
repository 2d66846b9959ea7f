//! Error types for GlacierKV
//!
//! Provides a unified error type for all operations.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using GlacierError
pub type Result<T> = std::result::Result<T, GlacierError>;

/// Unified error type for GlacierKV operations
#[derive(Debug, Error)]
pub enum GlacierError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Build Errors
    // -------------------------------------------------------------------------
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Build failed: {0}")]
    Build(String),

    // -------------------------------------------------------------------------
    // Attach Errors
    // -------------------------------------------------------------------------
    #[error("Snapshot not found: {0}")]
    SnapshotNotFound(PathBuf),

    #[error("Corrupt snapshot: {0}")]
    CorruptSnapshot(String),

    // -------------------------------------------------------------------------
    // Lookup Signals
    // -------------------------------------------------------------------------
    /// Ordinary control flow on the read path, never logged as an error.
    #[error("Key not found")]
    KeyNotFound,

    #[error("Reader is not attached to a snapshot")]
    NotAttached,
}
