//! Range query execution
//!
//! Thin layer over the storage engine's ordered scan: validates the
//! window, applies the configured row cap, and reports truncation
//! explicitly instead of silently dropping rows.

use crate::query::error::{QueryError, QueryResult};
use crate::storage::{StorageEngine, SystemSnapshot, TimeRange};
use std::sync::Arc;

/// Default safety cap on materialized rows per query
pub const DEFAULT_MAX_RESULT_ROWS: usize = 500_000;

/// Result of a range query
#[derive(Debug)]
pub struct RangeResult {
    /// Matching snapshots, ascending by `(timestamp, id)`
    pub snapshots: Vec<SystemSnapshot>,
    /// True when the row cap cut the result short
    pub truncated: bool,
}

/// Executes range queries against a storage engine
pub struct QueryExecutor {
    engine: Arc<StorageEngine>,
    /// Row cap; `None` disables the limit
    max_result_rows: Option<usize>,
}

impl QueryExecutor {
    pub fn new(engine: Arc<StorageEngine>) -> Self {
        Self {
            engine,
            max_result_rows: Some(DEFAULT_MAX_RESULT_ROWS),
        }
    }

    /// Override the row cap; 0 disables it
    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_result_rows = if max_rows == 0 { None } else { Some(max_rows) };
        self
    }

    /// Query `[start, end)`, ascending by `(timestamp, id)`
    ///
    /// An empty window (`start == end`) returns an empty result;
    /// `start > end` is an error. The window size itself is not capped —
    /// the row cap bounds memory for pathological windows.
    pub async fn range(&self, start: i64, end: i64) -> QueryResult<RangeResult> {
        if start > end {
            return Err(QueryError::InvalidRange { start, end });
        }

        let (snapshots, truncated) = self
            .engine
            .scan_range(TimeRange::new(start, end), self.max_result_rows)
            .await;

        if truncated {
            tracing::warn!(
                start,
                end,
                returned = snapshots.len(),
                "Range query hit the row cap; result truncated"
            );
        }

        Ok(RangeResult {
            snapshots,
            truncated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{SnapshotInput, StorageConfig};
    use tempfile::tempdir;

    async fn executor_with_data(
        timestamps: &[i64],
    ) -> (QueryExecutor, Arc<StorageEngine>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let engine = Arc::new(
            StorageEngine::new(StorageConfig::new(dir.path()))
                .await
                .unwrap(),
        );
        for (i, &t) in timestamps.iter().enumerate() {
            engine
                .append(
                    SnapshotInput::new(i as f64, 50.0, 1024, 1.0).timestamp(t),
                )
                .await
                .unwrap();
        }
        (QueryExecutor::new(Arc::clone(&engine)), engine, dir)
    }

    #[tokio::test]
    async fn test_range_half_open() {
        let (executor, _engine, _dir) = executor_with_data(&[1000, 2000, 3000]).await;

        let result = executor.range(1000, 3000).await.unwrap();
        let timestamps: Vec<i64> = result.snapshots.iter().map(|s| s.timestamp).collect();
        assert_eq!(timestamps, vec![1000, 2000]);
        assert!(!result.truncated);
    }

    #[tokio::test]
    async fn test_empty_range_is_not_an_error() {
        let (executor, _engine, _dir) = executor_with_data(&[1000, 2000]).await;

        let result = executor.range(1500, 1500).await.unwrap();
        assert!(result.snapshots.is_empty());
    }

    #[tokio::test]
    async fn test_inverted_range_rejected() {
        let (executor, _engine, _dir) = executor_with_data(&[1000]).await;

        let err = executor.range(2000, 1000).await.unwrap_err();
        assert!(matches!(
            err,
            QueryError::InvalidRange {
                start: 2000,
                end: 1000
            }
        ));
    }

    #[tokio::test]
    async fn test_row_cap_sets_truncated_flag() {
        let timestamps: Vec<i64> = (0..20).map(|i| i * 1000).collect();
        let (executor, engine, _dir) = executor_with_data(&timestamps).await;

        let capped = QueryExecutor::new(engine).with_max_rows(5);
        let result = capped.range(0, i64::MAX).await.unwrap();
        assert!(result.truncated);
        assert_eq!(result.snapshots.len(), 5);

        let result = executor.range(0, i64::MAX).await.unwrap();
        assert!(!result.truncated);
        assert_eq!(result.snapshots.len(), 20);
    }

    #[tokio::test]
    async fn test_zero_disables_row_cap() {
        let timestamps: Vec<i64> = (0..10).map(|i| i * 1000).collect();
        let (_, engine, _dir) = executor_with_data(&timestamps).await;

        let uncapped = QueryExecutor::new(engine).with_max_rows(0);
        let result = uncapped.range(0, i64::MAX).await.unwrap();
        assert_eq!(result.snapshots.len(), 10);
        assert!(!result.truncated);
    }

    #[tokio::test]
    async fn test_window_membership() {
        // A snapshot appears in [a, b) exactly when a <= ts < b
        let (executor, _engine, _dir) = executor_with_data(&[5000]).await;

        for (a, b, expected) in [
            (4000, 5000, 0usize),
            (4000, 5001, 1),
            (5000, 5001, 1),
            (5001, 6000, 0),
        ] {
            let result = executor.range(a, b).await.unwrap();
            assert_eq!(result.snapshots.len(), expected, "window [{}, {})", a, b);
        }
    }
}
