//! High-level store facade
//!
//! `HistoryStore` wires the storage engine, query executor, exporter,
//! pruner, and stats reporter together behind one handle, configured
//! from a single [`Config`]. Callers pass timestamps as strings in any
//! of the accepted forms; everything else takes and returns typed
//! values.
//!
//! Accepted timestamp forms:
//! - Unix milliseconds: `1700000000000`
//! - RFC 3339: `2024-01-15T10:30:00Z`
//! - Date only (midnight UTC): `2024-01-15`
//! - Relative: `now`, `now-6h`, `now-7d`, `now-2w`, `now-1m`

use crate::config::Config;
use crate::export::{CsvExporter, ExportError};
use crate::query::{QueryError, QueryExecutor, RangeResult};
use crate::retention::Pruner;
use crate::stats::{StatsReporter, StoreSummary};
use crate::storage::{
    SnapshotInput, StorageConfig, StorageEngine, StorageError, StorageStats,
};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced by the store facade
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Export(#[from] ExportError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// One handle over the whole historical metrics store
pub struct HistoryStore {
    engine: Arc<StorageEngine>,
    executor: QueryExecutor,
    exporter: CsvExporter,
    pruner: Pruner,
    stats: StatsReporter,
    retention_days: u32,
}

impl HistoryStore {
    /// Open (or create) the store described by the config
    ///
    /// Opening an existing store recovers its contents; opening a fresh
    /// directory initializes it. Safe to call repeatedly against the
    /// same directory, though only one handle should write at a time.
    pub async fn open(config: &Config) -> ServiceResult<Self> {
        let storage_config = StorageConfig {
            data_dir: PathBuf::from(&config.storage.data_dir),
            wal_sync: config.storage.wal_sync_mode(),
            checkpoint_threshold_bytes: config.storage.checkpoint_threshold_bytes,
        };

        let engine = Arc::new(StorageEngine::new(storage_config).await?);

        let executor = QueryExecutor::new(Arc::clone(&engine))
            .with_max_rows(config.query.max_result_rows);
        let export_executor = QueryExecutor::new(Arc::clone(&engine))
            .with_max_rows(config.query.max_result_rows);
        let exporter = CsvExporter::new(export_executor, &config.export.export_dir);
        let pruner = Pruner::new(Arc::clone(&engine));
        let stats = StatsReporter::new(Arc::clone(&engine));

        Ok(Self {
            engine,
            executor,
            exporter,
            pruner,
            stats,
            retention_days: config.retention.retention_days,
        })
    }

    /// Store one snapshot, returning its assigned id
    pub async fn append(&self, input: SnapshotInput) -> ServiceResult<u64> {
        Ok(self.engine.append(input).await?)
    }

    /// Query the half-open window `[start, end)`
    pub async fn range(&self, start: &str, end: &str) -> ServiceResult<RangeResult> {
        let start = parse_timestamp(start)?;
        let end = parse_timestamp(end)?;
        Ok(self.executor.range(start, end).await?)
    }

    /// Export the window `[start, end)` to CSV, returning the file path
    pub async fn export(&self, start: &str, end: &str) -> ServiceResult<PathBuf> {
        let start = parse_timestamp(start).map_err(ExportError::Query)?;
        let end = parse_timestamp(end).map_err(ExportError::Query)?;
        Ok(self.exporter.export(start, end).await?)
    }

    /// Delete snapshots older than `retention_days`, returning the count
    pub async fn prune(&self, retention_days: u32) -> ServiceResult<u64> {
        Ok(self.pruner.prune(retention_days).await?)
    }

    /// Delete snapshots older than the configured retention horizon
    pub async fn prune_default(&self) -> ServiceResult<u64> {
        self.prune(self.retention_days).await
    }

    /// Record count and time bounds of the stored history
    pub async fn summary(&self) -> StoreSummary {
        self.stats.summary().await
    }

    /// Low-level storage statistics
    pub async fn storage_stats(&self) -> StorageStats {
        self.engine.stats().await
    }

    /// Checkpoint and flush before shutdown
    pub async fn close(&self) -> ServiceResult<()> {
        Ok(self.engine.close().await?)
    }
}

/// Parse a timestamp string into Unix milliseconds
pub fn parse_timestamp(s: &str) -> Result<i64, QueryError> {
    // Raw Unix milliseconds
    if let Ok(millis) = s.parse::<i64>() {
        return Ok(millis);
    }

    // Relative times
    if s.starts_with("now") {
        let now = Utc::now().timestamp_millis();
        if s == "now" {
            return Ok(now);
        }

        let re = regex::Regex::new(r"^now-(\d+)([hdwm])$")
            .map_err(|_| QueryError::BadTimestamp(s.to_string()))?;

        if let Some(caps) = re.captures(s) {
            let amount: i64 = caps[1]
                .parse()
                .map_err(|_| QueryError::BadTimestamp(s.to_string()))?;

            let ms = match &caps[2] {
                "h" => amount * 3600 * 1000,
                "d" => amount * 24 * 3600 * 1000,
                "w" => amount * 7 * 24 * 3600 * 1000,
                "m" => amount * 30 * 24 * 3600 * 1000,
                _ => return Err(QueryError::BadTimestamp(s.to_string())),
            };

            return Ok(now - ms);
        }

        return Err(QueryError::BadTimestamp(s.to_string()));
    }

    // ISO 8601
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Ok(dt.timestamp_millis());
    }

    // Date only, interpreted as midnight UTC
    if let Ok(date) = chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Ok(dt.and_utc().timestamp_millis());
        }
    }

    Err(QueryError::BadTimestamp(s.to_string()))
}
