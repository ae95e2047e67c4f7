//! Retention pruning
//!
//! Deletes snapshots older than a configurable horizon. Scheduling is the
//! caller's concern; this module only performs the delete and reports how
//! many records it removed.

use crate::storage::{StorageEngine, StorageResult};
use chrono::{Duration, Utc};
use std::sync::Arc;

/// Enforces the retention policy against a storage engine
pub struct Pruner {
    engine: Arc<StorageEngine>,
}

impl Pruner {
    pub fn new(engine: Arc<StorageEngine>) -> Self {
        Self { engine }
    }

    /// Delete every snapshot older than `retention_days`, returning the count
    ///
    /// The cutoff is `now - retention_days`, so `prune(0)` deletes
    /// everything strictly older than the current instant rather than
    /// being a no-op. Re-running with no intervening writes deletes 0.
    pub async fn prune(&self, retention_days: u32) -> StorageResult<u64> {
        let cutoff = Utc::now() - Duration::days(retention_days as i64);
        let cutoff_millis = cutoff.timestamp_millis();

        tracing::debug!(retention_days, cutoff = %cutoff.to_rfc3339(), "Pruning snapshots");
        let deleted = self.engine.delete_before(cutoff_millis).await?;

        if deleted > 0 {
            tracing::info!(retention_days, deleted, "Retention prune complete");
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{SnapshotInput, StorageConfig};
    use tempfile::tempdir;

    async fn engine_with_ages(ages_days: &[i64]) -> (Pruner, Arc<StorageEngine>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let engine = Arc::new(
            StorageEngine::new(StorageConfig::new(dir.path()))
                .await
                .unwrap(),
        );
        let now = Utc::now();
        for &age in ages_days {
            engine
                .append(
                    SnapshotInput::new(10.0, 50.0, 1024, 1.0).at(now - Duration::days(age)),
                )
                .await
                .unwrap();
        }
        (Pruner::new(Arc::clone(&engine)), engine, dir)
    }

    #[tokio::test]
    async fn test_prune_removes_only_expired() {
        // Snapshots aged 1..10 days
        let ages: Vec<i64> = (1..=10).collect();
        let (pruner, engine, _dir) = engine_with_ages(&ages).await;

        let deleted = pruner.prune(7).await.unwrap();
        assert_eq!(deleted, 3); // ages 8, 9, 10
        assert_eq!(engine.count().await, 7);

        // Everything left is within the horizon
        let cutoff = (Utc::now() - Duration::days(7)).timestamp_millis();
        assert!(engine.min_timestamp().await.unwrap() >= cutoff);
    }

    #[tokio::test]
    async fn test_prune_idempotent() {
        let (pruner, _engine, _dir) = engine_with_ages(&[1, 5, 9]).await;

        assert_eq!(pruner.prune(3).await.unwrap(), 2);
        assert_eq!(pruner.prune(3).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_prune_zero_days_deletes_everything_past() {
        let (pruner, engine, _dir) = engine_with_ages(&[0, 1, 2]).await;

        // All stored timestamps are at or before "now", so prune(0)
        // clears the store
        let deleted = pruner.prune(0).await.unwrap();
        assert_eq!(deleted, 3);
        assert_eq!(engine.count().await, 0);
    }

    #[tokio::test]
    async fn test_prune_empty_store() {
        let (pruner, _engine, _dir) = engine_with_ages(&[]).await;
        assert_eq!(pruner.prune(30).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_future_records_survive_prune() {
        let dir = tempdir().unwrap();
        let engine = Arc::new(
            StorageEngine::new(StorageConfig::new(dir.path()))
                .await
                .unwrap(),
        );
        engine
            .append(
                SnapshotInput::new(10.0, 50.0, 1024, 1.0)
                    .at(Utc::now() + Duration::hours(1)),
            )
            .await
            .unwrap();

        let pruner = Pruner::new(Arc::clone(&engine));
        assert_eq!(pruner.prune(0).await.unwrap(), 0);
        assert_eq!(engine.count().await, 1);
    }
}
