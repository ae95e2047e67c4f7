//! CSV export of snapshot ranges
//!
//! Serializes a query result set to a timestamped CSV file under the
//! configured export directory and returns the absolute path. Nested
//! disk and network fields are flattened into named columns; every row
//! in one export carries the same column set, padded to the maximum
//! disk count seen in the exported range.
//!
//! The file is written to a temp path and renamed into place, and the
//! temp file is removed on every failure path, so callers never observe
//! a truncated export.

use crate::query::{QueryError, QueryExecutor};
use crate::storage::SystemSnapshot;
use chrono::{SecondsFormat, Utc};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Rows written between cooperative yield points
const ROWS_PER_CHUNK: usize = 1024;

/// Errors that can occur during CSV export
#[derive(Error, Debug)]
pub enum ExportError {
    /// The underlying range query failed
    #[error("Export query failed: {0}")]
    Query(#[from] QueryError),

    /// Filesystem failure while writing the export
    #[error("Export IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV serialization failure
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type ExportResult<T> = Result<T, ExportError>;

/// Removes the temp file unless the export completed
struct TempFileGuard {
    path: PathBuf,
    armed: bool,
}

impl TempFileGuard {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn defuse(mut self) {
        self.armed = false;
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if self.armed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Exports snapshot ranges to CSV files
pub struct CsvExporter {
    executor: QueryExecutor,
    export_dir: PathBuf,
}

impl CsvExporter {
    pub fn new(executor: QueryExecutor, export_dir: impl Into<PathBuf>) -> Self {
        Self {
            executor,
            export_dir: export_dir.into(),
        }
    }

    /// Export `[start, end)` to a CSV file, returning its absolute path
    ///
    /// An empty range still produces a valid file containing only the
    /// header row. Yields between row chunks so a caller abandoning the
    /// future cancels the export at an iteration boundary.
    pub async fn export(&self, start: i64, end: i64) -> ExportResult<PathBuf> {
        let result = self.executor.range(start, end).await?;
        if result.truncated {
            tracing::warn!(start, end, "Export range hit the row cap; file is partial");
        }

        std::fs::create_dir_all(&self.export_dir)?;

        let filename = format!(
            "system_history_{}.csv",
            Utc::now().format("%Y%m%d_%H%M%S%3f")
        );
        let final_path = self.export_dir.join(&filename);
        let tmp_path = self.export_dir.join(format!("{}.tmp", filename));

        let guard = TempFileGuard::new(tmp_path.clone());
        self.write_rows(&tmp_path, &result.snapshots).await?;
        std::fs::rename(&tmp_path, &final_path)?;
        guard.defuse();

        let absolute = std::fs::canonicalize(&final_path).unwrap_or(final_path);
        tracing::info!(
            rows = result.snapshots.len(),
            path = %absolute.display(),
            "Export complete"
        );
        Ok(absolute)
    }

    async fn write_rows(&self, path: &Path, snapshots: &[SystemSnapshot]) -> ExportResult<()> {
        let max_disks = snapshots
            .iter()
            .map(|s| s.disk_usage.len())
            .max()
            .unwrap_or(0);

        let file = std::fs::File::create(path)?;
        let mut writer = csv::Writer::from_writer(file);

        writer.write_record(header_columns(max_disks))?;

        for (row, snapshot) in snapshots.iter().enumerate() {
            writer.write_record(flatten_row(snapshot, max_disks))?;

            if (row + 1) % ROWS_PER_CHUNK == 0 {
                writer.flush()?;
                tokio::task::yield_now().await;
            }
        }

        writer.flush()?;
        let file = writer.into_inner().map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
        })?;
        file.sync_all()?;

        Ok(())
    }
}

/// Header row for an export with `max_disks` disk column groups
fn header_columns(max_disks: usize) -> Vec<String> {
    let mut columns = vec![
        "id".to_string(),
        "timestamp".to_string(),
        "cpu_usage".to_string(),
        "memory_usage".to_string(),
        "memory_total".to_string(),
        "system_load".to_string(),
        "net_bytes_received".to_string(),
        "net_bytes_sent".to_string(),
        "net_packets_received".to_string(),
        "net_packets_sent".to_string(),
    ];

    for i in 0..max_disks {
        columns.push(format!("disk_{}_mount_point", i));
        columns.push(format!("disk_{}_used_space", i));
        columns.push(format!("disk_{}_total_space", i));
        columns.push(format!("disk_{}_usage_percent", i));
    }

    columns
}

/// Flatten one snapshot into a CSV row matching `header_columns`
///
/// Snapshots with fewer disks than `max_disks` pad the remaining disk
/// columns with empty cells.
fn flatten_row(snapshot: &SystemSnapshot, max_disks: usize) -> Vec<String> {
    let timestamp = snapshot
        .datetime()
        .to_rfc3339_opts(SecondsFormat::Millis, true);

    let mut row = vec![
        snapshot.id.to_string(),
        timestamp,
        snapshot.cpu_usage.to_string(),
        snapshot.memory_usage.to_string(),
        snapshot.memory_total.to_string(),
        snapshot.system_load.to_string(),
        snapshot.network_traffic.bytes_received.to_string(),
        snapshot.network_traffic.bytes_sent.to_string(),
        snapshot.network_traffic.packets_received.to_string(),
        snapshot.network_traffic.packets_sent.to_string(),
    ];

    for i in 0..max_disks {
        match snapshot.disk_usage.get(i) {
            Some(disk) => {
                row.push(disk.mount_point.clone());
                row.push(disk.used_space.to_string());
                row.push(disk.total_space.to_string());
                row.push(disk.usage_percent.to_string());
            }
            None => {
                row.extend(std::iter::repeat(String::new()).take(4));
            }
        }
    }

    row
}
