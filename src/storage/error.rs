//! Storage engine error types
//!
//! Defines all errors that can occur in the storage layer.

use thiserror::Error;

/// Errors that can occur in the storage engine
#[derive(Error, Debug)]
pub enum StorageError {
    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Data corruption detected (checksum mismatch, invalid magic, etc.)
    #[error("Corrupt data: {0}")]
    Corruption(String),

    /// Snapshot fields violate an invariant at append time
    #[error("Validation error: {0}")]
    Validation(String),

    /// No snapshot with the requested id exists
    #[error("Snapshot not found: {0}")]
    NotFound(u64),

    /// WAL format or recovery error
    #[error("WAL error: {0}")]
    Wal(String),

    /// Checkpoint file format error
    #[error("Invalid checkpoint: {0}")]
    InvalidCheckpoint(String),
}

impl From<bincode::Error> for StorageError {
    fn from(err: bincode::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
