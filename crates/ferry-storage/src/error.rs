//! Storage error types.

use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The requested object does not exist.
    #[error("object not found: {0}")]
    ObjectNotFound(String),

    /// The requested reference does not exist.
    #[error("reference not found: {0}")]
    RefNotFound(String),

    /// A reference could not be resolved or parsed.
    #[error("invalid reference: {0}")]
    InvalidRef(String),

    /// An object is malformed or has an unexpected type.
    #[error("invalid object: {0}")]
    InvalidObject(String),

    /// Zlib compression or decompression failed.
    #[error("compression error: {0}")]
    Compression(String),
}
