//! Store summary statistics
//!
//! Reports the record count and the time bounds of the stored history.
//! The summary is derived entirely from the engine's live state, so it
//! stays consistent with appends and retention deletes without any
//! bookkeeping of its own.

use crate::storage::StorageEngine;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// High-level summary of the store contents
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StoreSummary {
    /// Number of snapshots currently stored
    pub total_records: u64,
    /// Capture time of the oldest snapshot, absent when the store is empty
    pub oldest_timestamp: Option<DateTime<Utc>>,
    /// Capture time of the newest snapshot, absent when the store is empty
    pub newest_timestamp: Option<DateTime<Utc>>,
}

/// Produces summaries of a storage engine's contents
pub struct StatsReporter {
    engine: Arc<StorageEngine>,
}

impl StatsReporter {
    pub fn new(engine: Arc<StorageEngine>) -> Self {
        Self { engine }
    }

    /// Summarize the current store contents
    ///
    /// Count and time bounds are read under a single state lock, so the
    /// summary describes one consistent point in time.
    pub async fn summary(&self) -> StoreSummary {
        let (count, bounds) = self.engine.count_and_bounds().await;

        let (oldest, newest) = match bounds {
            Some((min, max)) => (
                DateTime::from_timestamp_millis(min),
                DateTime::from_timestamp_millis(max),
            ),
            None => (None, None),
        };

        StoreSummary {
            total_records: count,
            oldest_timestamp: oldest,
            newest_timestamp: newest,
        }
    }
}
