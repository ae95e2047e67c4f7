//! Query error types

use thiserror::Error;

/// Errors that can occur during query operations
#[derive(Error, Debug)]
pub enum QueryError {
    /// Range start is after range end
    #[error("Invalid time range: start {start} is after end {end}")]
    InvalidRange { start: i64, end: i64 },

    /// A timestamp string could not be parsed
    #[error("Cannot parse timestamp: {0}")]
    BadTimestamp(String),

    /// Storage layer error
    #[error("Storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),
}

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;
