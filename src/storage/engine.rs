//! Vigil storage engine
//!
//! Orchestrates the persistence components:
//! - Write path: SnapshotInput → validate → WAL → memtable
//! - Read path: range scan over the `(timestamp, id)` B-tree
//! - Durability: checkpoint file + WAL replay on open
//!
//! A single writer mutates the store at a time (the write half of the
//! RwLock); readers share the read half and always receive owned copies,
//! so a concurrent prune can never invalidate a caller's result set.

use crate::storage::checkpoint::{load_checkpoint, write_checkpoint};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::{SnapshotInput, SystemSnapshot, TimeRange};
use crate::storage::wal::{WalRecord, WalSyncMode, WriteAheadLog};
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound::{Excluded, Included};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Configuration for the storage engine
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Root directory for all data
    pub data_dir: PathBuf,
    /// WAL sync strategy
    pub wal_sync: WalSyncMode,
    /// WAL size that triggers a checkpoint (default: 8MB)
    pub checkpoint_threshold_bytes: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("vigil_data"),
            wal_sync: WalSyncMode::Batched,
            checkpoint_threshold_bytes: 8 * 1024 * 1024,
        }
    }
}

impl StorageConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Get path to the WAL file
    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("wal").join("current.wal")
    }

    /// Get path to the checkpoint file
    pub fn checkpoint_path(&self) -> PathBuf {
        self.data_dir.join("store.ckpt")
    }
}

/// In-memory table: the authoritative, fully indexed record set
#[derive(Debug, Default)]
struct MemTable {
    /// Records ordered by `(timestamp, id)`
    records: BTreeMap<(i64, u64), SystemSnapshot>,
    /// Secondary lookup: id → timestamp
    by_id: HashMap<u64, i64>,
    /// Next id to assign
    next_id: u64,
}

impl MemTable {
    fn insert(&mut self, snapshot: SystemSnapshot) {
        self.by_id.insert(snapshot.id, snapshot.timestamp);
        self.next_id = self.next_id.max(snapshot.id + 1);
        self.records.insert(snapshot.key(), snapshot);
    }

    /// Remove every record with `timestamp < cutoff`, returning the count
    fn delete_before(&mut self, cutoff: i64) -> u64 {
        // Ids start at 1, so (cutoff, 0) splits exactly at the timestamp
        let kept = self.records.split_off(&(cutoff, 0));
        let removed = std::mem::replace(&mut self.records, kept);
        for (_, id) in removed.keys() {
            self.by_id.remove(id);
        }
        removed.len() as u64
    }
}

/// The vigil storage engine
pub struct StorageEngine {
    config: StorageConfig,
    /// Write-ahead log; locked only while the memtable write lock is held
    wal: Arc<RwLock<WriteAheadLog>>,
    /// Memtable; write half serializes all mutations
    state: Arc<RwLock<MemTable>>,
    /// Persisted frames dropped during recovery (checkpoint + WAL)
    corrupt_frames: AtomicU64,
}

impl StorageEngine {
    /// Open the store, recovering from checkpoint + WAL
    pub async fn new(config: StorageConfig) -> StorageResult<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        std::fs::create_dir_all(config.data_dir.join("wal"))?;

        let checkpoint = load_checkpoint(&config.checkpoint_path())?;
        let mut table = MemTable {
            next_id: checkpoint.next_id.max(1),
            ..Default::default()
        };
        for snapshot in checkpoint.snapshots {
            table.insert(snapshot);
        }

        let wal = WriteAheadLog::open(config.wal_path(), config.wal_sync)?;
        let replay = wal.replay()?;
        let replayed = replay.records.len();
        for record in replay.records {
            match record {
                WalRecord::Append(snapshot) => table.insert(snapshot),
                WalRecord::DeleteBefore { cutoff } => {
                    table.delete_before(cutoff);
                }
            }
        }

        let corrupt = replay.corrupt_frames + checkpoint.corrupt_frames;
        if corrupt > 0 {
            tracing::warn!("Recovery skipped {} corrupt frames", corrupt);
        }
        if replayed > 0 {
            tracing::info!("Replayed {} WAL records", replayed);
        }
        tracing::info!("Store opened with {} snapshots", table.records.len());

        Ok(Self {
            config,
            wal: Arc::new(RwLock::new(wal)),
            state: Arc::new(RwLock::new(table)),
            corrupt_frames: AtomicU64::new(corrupt),
        })
    }

    /// Append a snapshot, returning its assigned id
    ///
    /// Validates the input, logs it to the WAL, then applies it to the
    /// memtable. I/O failures surface to the caller and are not retried;
    /// a failed append leaves the store unchanged.
    pub async fn append(&self, input: SnapshotInput) -> StorageResult<u64> {
        input.validate()?;

        let id = {
            let mut state = self.state.write().await;
            let id = state.next_id;
            let snapshot = input.into_snapshot(id);

            {
                let mut wal = self.wal.write().await;
                wal.append(&WalRecord::Append(snapshot.clone()))?;
            }

            state.insert(snapshot);
            id
        };

        self.maybe_checkpoint().await?;
        Ok(id)
    }

    /// Fetch a single snapshot by id
    pub async fn get(&self, id: u64) -> StorageResult<SystemSnapshot> {
        let state = self.state.read().await;
        let timestamp = *state.by_id.get(&id).ok_or(StorageError::NotFound(id))?;
        state
            .records
            .get(&(timestamp, id))
            .cloned()
            .ok_or(StorageError::NotFound(id))
    }

    /// Delete every snapshot with `timestamp < cutoff`, returning the count
    ///
    /// The delete is applied atomically under the write lock: a concurrent
    /// scan observes either the pre-delete or post-delete record set. The
    /// tombstone is WAL-logged first, so a crash mid-delete replays it.
    pub async fn delete_before(&self, cutoff: i64) -> StorageResult<u64> {
        let deleted = {
            let mut state = self.state.write().await;

            {
                let mut wal = self.wal.write().await;
                wal.append(&WalRecord::DeleteBefore { cutoff })?;
            }

            state.delete_before(cutoff)
        };

        if deleted > 0 {
            tracing::info!(cutoff, deleted, "Deleted snapshots before cutoff");
        }

        self.maybe_checkpoint().await?;
        Ok(deleted)
    }

    /// Scan a half-open time range in ascending `(timestamp, id)` order
    ///
    /// `limit` caps the materialized result; the second tuple element is
    /// true when records past the cap were left out.
    pub async fn scan_range(
        &self,
        range: TimeRange,
        limit: Option<usize>,
    ) -> (Vec<SystemSnapshot>, bool) {
        if range.is_empty() {
            return (Vec::new(), false);
        }

        let state = self.state.read().await;
        let bounds = (
            Included((range.start, u64::MIN)),
            Excluded((range.end, u64::MIN)),
        );

        let mut results = Vec::new();
        let mut truncated = false;
        for (_, snapshot) in state.records.range(bounds) {
            if let Some(max) = limit {
                if results.len() >= max {
                    truncated = true;
                    break;
                }
            }
            results.push(snapshot.clone());
        }

        (results, truncated)
    }

    /// Number of stored snapshots
    pub async fn count(&self) -> u64 {
        self.state.read().await.records.len() as u64
    }

    /// Timestamp of the oldest stored snapshot
    pub async fn min_timestamp(&self) -> Option<i64> {
        let state = self.state.read().await;
        state.records.keys().next().map(|(ts, _)| *ts)
    }

    /// Timestamp of the newest stored snapshot
    pub async fn max_timestamp(&self) -> Option<i64> {
        let state = self.state.read().await;
        state.records.keys().next_back().map(|(ts, _)| *ts)
    }

    /// Oldest and newest timestamps in one read
    pub async fn time_bounds(&self) -> Option<(i64, i64)> {
        let state = self.state.read().await;
        let oldest = state.records.keys().next().map(|(ts, _)| *ts)?;
        let newest = state.records.keys().next_back().map(|(ts, _)| *ts)?;
        Some((oldest, newest))
    }

    /// Record count plus time bounds from a single state read
    pub async fn count_and_bounds(&self) -> (u64, Option<(i64, i64)>) {
        let state = self.state.read().await;
        let count = state.records.len() as u64;
        let oldest = state.records.keys().next().map(|(ts, _)| *ts);
        let newest = state.records.keys().next_back().map(|(ts, _)| *ts);
        (count, oldest.zip(newest))
    }

    /// Write a checkpoint and truncate the WAL
    ///
    /// Holds the write lock for the duration so no mutation can land
    /// between the checkpoint image and the WAL truncation.
    pub async fn checkpoint(&self) -> StorageResult<()> {
        let state = self.state.write().await;
        let mut wal = self.wal.write().await;

        write_checkpoint(
            &self.config.checkpoint_path(),
            state.records.values(),
            state.records.len() as u64,
            state.next_id,
        )?;
        wal.truncate()?;

        tracing::debug!("Checkpointed {} snapshots", state.records.len());
        Ok(())
    }

    async fn maybe_checkpoint(&self) -> StorageResult<()> {
        let wal_size = {
            let wal = self.wal.read().await;
            wal.file_size().unwrap_or(0)
        };

        if wal_size >= self.config.checkpoint_threshold_bytes {
            self.checkpoint().await?;
        }
        Ok(())
    }

    /// Flush state and release cleanly
    pub async fn close(&self) -> StorageResult<()> {
        self.checkpoint().await?;
        let mut wal = self.wal.write().await;
        wal.sync()?;
        Ok(())
    }

    /// Get storage statistics
    pub async fn stats(&self) -> StorageStats {
        let state = self.state.read().await;
        let wal = self.wal.read().await;

        let memory_bytes: usize = state.records.values().map(|s| s.estimated_size()).sum();
        let checkpoint_bytes = std::fs::metadata(self.config.checkpoint_path())
            .map(|m| m.len())
            .unwrap_or(0);
        let wal_bytes = wal.file_size().unwrap_or(0);

        StorageStats {
            record_count: state.records.len() as u64,
            wal_entries: wal.entry_count(),
            disk_bytes: checkpoint_bytes + wal_bytes,
            memory_bytes,
            corrupt_frames_skipped: self.corrupt_frames.load(Ordering::Relaxed),
        }
    }

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }
}

/// Storage statistics
#[derive(Debug, Clone)]
pub struct StorageStats {
    pub record_count: u64,
    pub wal_entries: u64,
    pub disk_bytes: u64,
    pub memory_bytes: usize,
    pub corrupt_frames_skipped: u64,
}

impl std::fmt::Display for StorageStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Records: {}, WAL entries: {}, Disk: {:.2} MB, Memory: {:.2} MB",
            self.record_count,
            self.wal_entries,
            self.disk_bytes as f64 / (1024.0 * 1024.0),
            self.memory_bytes as f64 / (1024.0 * 1024.0)
        )
    }
}
