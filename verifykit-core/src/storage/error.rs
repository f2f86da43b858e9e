//! Error types for the key-value persistence layer.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by key-value store implementations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backing store refused or failed the read.
    #[error("read error: {0}")]
    Read(String),

    /// The backing store refused or failed the write.
    #[error("write error: {0}")]
    Write(String),

    /// The store lock was poisoned.
    #[error("storage lock error: {0}")]
    Lock(String),
}
