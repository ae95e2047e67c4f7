//! Range queries over the snapshot store
//!
//! The dashboard's chart windows (1h/24h/7d/30d presets) all reduce to a
//! single query form: an ordered scan of a half-open `[start, end)`
//! window. The executor validates the window and applies a configurable
//! row cap so a multi-year query cannot exhaust memory unannounced.

pub mod error;
pub mod executor;

pub use error::{QueryError, QueryResult};
pub use executor::{QueryExecutor, RangeResult, DEFAULT_MAX_RESULT_ROWS};
