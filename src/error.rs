//! Error types for pngdb
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using PngDbError
pub type Result<T> = std::result::Result<T, PngDbError>;

/// Unified error type for pngdb operations
#[derive(Debug, Error)]
pub enum PngDbError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // On-disk Format Errors
    // -------------------------------------------------------------------------
    /// Signature, CRC, type tag, framing or ordering check failed
    #[error("Format error: {0}")]
    Format(String),

    // -------------------------------------------------------------------------
    // Key Space Errors
    // -------------------------------------------------------------------------
    #[error("Entry not found")]
    NotFound,

    #[error("Entry already exists")]
    AlreadyExists,

    // -------------------------------------------------------------------------
    // Entry Errors
    // -------------------------------------------------------------------------
    #[error("Invalid entry: {0}")]
    InvalidEntry(String),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    // -------------------------------------------------------------------------
    // Backend Errors
    // -------------------------------------------------------------------------
    #[error("{0}: not implemented by this backend")]
    NotImplemented(&'static str),

    #[error("Backend not initialized")]
    NotInitialized,

    #[error("Backend is read-only")]
    ReadOnly,

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Failure states of the zlib decompressor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("zlib stream error")]
    Stream,

    #[error("zlib need dict error")]
    NeedDictionary,

    #[error("zlib data error")]
    Data,

    #[error("zlib out-of-memory error")]
    OutOfMemory,

    #[error("zlib stream incomplete")]
    Incomplete,
}

impl PngDbError {
    /// Shorthand for building a `Format` error
    pub(crate) fn format(msg: impl Into<String>) -> Self {
        PngDbError::Format(msg.into())
    }
}
