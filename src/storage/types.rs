//! Core data types for the vigil historical metrics store
//!
//! This module defines the types used throughout the storage layer:
//! - `SystemSnapshot`: one stored system-metrics sample
//! - `DiskUsage` / `NetworkTraffic`: nested per-snapshot measurements
//! - `SnapshotInput`: the collector-facing record before an id is assigned
//! - `TimeRange`: a half-open time interval for queries

use crate::storage::error::{StorageError, StorageResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Disk usage for a single mount point at capture time
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiskUsage {
    pub mount_point: String,
    /// Bytes in use; never exceeds `total_space`
    pub used_space: u64,
    /// Total capacity in bytes
    pub total_space: u64,
    /// Percent used, 0-100
    pub usage_percent: f64,
}

impl DiskUsage {
    pub fn new(
        mount_point: impl Into<String>,
        used_space: u64,
        total_space: u64,
        usage_percent: f64,
    ) -> Self {
        Self {
            mount_point: mount_point.into(),
            used_space,
            total_space,
            usage_percent,
        }
    }
}

/// Network interface counters at capture time
///
/// Counters are not monotonic across snapshots; they reset on reboot.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkTraffic {
    pub bytes_received: u64,
    pub bytes_sent: u64,
    pub packets_received: u64,
    pub packets_sent: u64,
}

impl NetworkTraffic {
    pub fn new(
        bytes_received: u64,
        bytes_sent: u64,
        packets_received: u64,
        packets_sent: u64,
    ) -> Self {
        Self {
            bytes_received,
            bytes_sent,
            packets_received,
            packets_sent,
        }
    }
}

/// One stored system-metrics sample
///
/// Immutable once stored: records are only ever inserted and later removed
/// by retention pruning. The `id` is unique for the lifetime of the store
/// and monotonically increasing, so `(timestamp, id)` orders records
/// deterministically even when timestamps collide.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SystemSnapshot {
    /// Store-assigned unique identifier, increasing in insertion order
    pub id: u64,
    /// Unix timestamp in milliseconds (UTC)
    pub timestamp: i64,
    /// CPU usage percent, 0-100
    pub cpu_usage: f64,
    /// Memory usage percent, 0-100
    pub memory_usage: f64,
    /// Total physical memory in bytes
    pub memory_total: u64,
    /// Load-average style metric, non-negative and unbounded
    pub system_load: f64,
    /// Per-mount disk usage, in the order the collector reported it
    #[serde(default)]
    pub disk_usage: Vec<DiskUsage>,
    /// Network counters at capture
    #[serde(default)]
    pub network_traffic: NetworkTraffic,
}

impl SystemSnapshot {
    /// Timestamp as a chrono UTC datetime (millisecond precision)
    pub fn datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.timestamp).unwrap_or_else(Utc::now)
    }

    /// Ordering key within the store
    pub fn key(&self) -> (i64, u64) {
        (self.timestamp, self.id)
    }

    /// Estimated in-memory size in bytes (for stats reporting)
    pub fn estimated_size(&self) -> usize {
        let disk_size: usize = self
            .disk_usage
            .iter()
            .map(|d| d.mount_point.len() + 32)
            .sum();
        // Fixed fields: id(8) + timestamp(8) + 3 floats + memory_total(8) + network(32)
        88 + disk_size
    }
}

/// Collector-facing snapshot fields, before the store assigns an id
///
/// Built with the builder methods and validated at append time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotInput {
    /// Capture time; current time is used when absent
    pub timestamp: Option<i64>,
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub memory_total: u64,
    pub system_load: f64,
    #[serde(default)]
    pub disk_usage: Vec<DiskUsage>,
    #[serde(default)]
    pub network_traffic: NetworkTraffic,
}

impl SnapshotInput {
    /// Create an input with the required scalar metrics
    pub fn new(cpu_usage: f64, memory_usage: f64, memory_total: u64, system_load: f64) -> Self {
        Self {
            timestamp: None,
            cpu_usage,
            memory_usage,
            memory_total,
            system_load,
            disk_usage: Vec::new(),
            network_traffic: NetworkTraffic::default(),
        }
    }

    /// Builder method: set an explicit capture timestamp (Unix millis)
    pub fn timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Builder method: set the capture timestamp from a datetime
    pub fn at(mut self, at: DateTime<Utc>) -> Self {
        self.timestamp = Some(at.timestamp_millis());
        self
    }

    /// Builder method: add a disk entry
    pub fn disk(mut self, disk: DiskUsage) -> Self {
        self.disk_usage.push(disk);
        self
    }

    /// Builder method: replace all disk entries
    pub fn disks(mut self, disks: Vec<DiskUsage>) -> Self {
        self.disk_usage = disks;
        self
    }

    /// Builder method: set network counters
    pub fn network(mut self, network: NetworkTraffic) -> Self {
        self.network_traffic = network;
        self
    }

    /// Validate all field invariants
    ///
    /// Percent fields must lie in [0, 100], floats must be finite,
    /// `memory_total` must be positive, `system_load` non-negative, and
    /// every disk entry must satisfy `used_space <= total_space`.
    pub fn validate(&self) -> StorageResult<()> {
        check_percent("cpu_usage", self.cpu_usage)?;
        check_percent("memory_usage", self.memory_usage)?;

        if self.memory_total == 0 {
            return Err(StorageError::Validation(
                "memory_total must be greater than zero".to_string(),
            ));
        }

        if !self.system_load.is_finite() || self.system_load < 0.0 {
            return Err(StorageError::Validation(format!(
                "system_load must be finite and non-negative, got {}",
                self.system_load
            )));
        }

        for disk in &self.disk_usage {
            if disk.used_space > disk.total_space {
                return Err(StorageError::Validation(format!(
                    "disk {}: used_space {} exceeds total_space {}",
                    disk.mount_point, disk.used_space, disk.total_space
                )));
            }
            check_percent(
                &format!("disk {} usage_percent", disk.mount_point),
                disk.usage_percent,
            )?;
        }

        Ok(())
    }

    /// Materialize into a snapshot with the given id
    ///
    /// Uses the current time when no capture timestamp was provided.
    pub fn into_snapshot(self, id: u64) -> SystemSnapshot {
        SystemSnapshot {
            id,
            timestamp: self
                .timestamp
                .unwrap_or_else(|| Utc::now().timestamp_millis()),
            cpu_usage: self.cpu_usage,
            memory_usage: self.memory_usage,
            memory_total: self.memory_total,
            system_load: self.system_load,
            disk_usage: self.disk_usage,
            network_traffic: self.network_traffic,
        }
    }
}

fn check_percent(field: &str, value: f64) -> StorageResult<()> {
    if !value.is_finite() || !(0.0..=100.0).contains(&value) {
        return Err(StorageError::Validation(format!(
            "{} must be a percent in [0, 100], got {}",
            field, value
        )));
    }
    Ok(())
}

/// Time range for queries (half-open interval: [start, end))
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    /// Start timestamp (inclusive), in milliseconds
    pub start: i64,
    /// End timestamp (exclusive), in milliseconds
    pub end: i64,
}

impl TimeRange {
    /// Create a time range; `start == end` denotes an empty range
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Create a range for the last N hours from now
    pub fn last_hours(hours: i64) -> Self {
        let end = Utc::now().timestamp_millis();
        Self {
            start: end - hours * 3600 * 1000,
            end,
        }
    }

    /// Create a range for the last N days from now
    pub fn last_days(days: i64) -> Self {
        Self::last_hours(days * 24)
    }

    /// Range covering everything in the store
    pub fn all() -> Self {
        Self {
            start: i64::MIN,
            end: i64::MAX,
        }
    }

    /// Check if a timestamp falls within this range
    pub fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.start && timestamp < self.end
    }

    /// True when the range can match no record
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Get the duration in milliseconds
    pub fn duration_millis(&self) -> i64 {
        self.end - self.start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_input() -> SnapshotInput {
        SnapshotInput::new(42.0, 61.5, 16 * 1024 * 1024 * 1024, 1.25)
            .disk(DiskUsage::new("/", 80, 100, 80.0))
            .network(NetworkTraffic::new(1000, 2000, 10, 20))
    }

    #[test]
    fn test_valid_input_passes() {
        assert!(valid_input().validate().is_ok());
    }

    #[test]
    fn test_percent_bounds() {
        let mut input = valid_input();
        input.cpu_usage = 100.0;
        assert!(input.validate().is_ok());

        input.cpu_usage = 100.1;
        assert!(matches!(input.validate(), Err(StorageError::Validation(_))));

        input.cpu_usage = -0.1;
        assert!(input.validate().is_err());

        input.cpu_usage = f64::NAN;
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_disk_used_exceeds_total_rejected() {
        let input = SnapshotInput::new(10.0, 10.0, 1024, 0.5)
            .disk(DiskUsage::new("C:", 120, 100, 80.0));

        let err = input.validate().unwrap_err();
        assert!(err.to_string().contains("used_space"));
    }

    #[test]
    fn test_zero_memory_total_rejected() {
        let mut input = valid_input();
        input.memory_total = 0;
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_negative_load_rejected() {
        let mut input = valid_input();
        input.system_load = -0.5;
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_into_snapshot_keeps_explicit_timestamp() {
        let snapshot = valid_input().timestamp(1_700_000_000_000).into_snapshot(7);
        assert_eq!(snapshot.id, 7);
        assert_eq!(snapshot.timestamp, 1_700_000_000_000);
        assert_eq!(snapshot.key(), (1_700_000_000_000, 7));
    }

    #[test]
    fn test_into_snapshot_defaults_to_now() {
        let before = Utc::now().timestamp_millis();
        let snapshot = valid_input().into_snapshot(1);
        let after = Utc::now().timestamp_millis();
        assert!(snapshot.timestamp >= before && snapshot.timestamp <= after);
    }

    #[test]
    fn test_snapshot_serialization() {
        let snapshot = valid_input().timestamp(1000).into_snapshot(1);
        let json = serde_json::to_string(&snapshot).unwrap();
        let restored: SystemSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(snapshot, restored);
    }

    #[test]
    fn test_time_range_contains() {
        let range = TimeRange::new(1000, 2000);

        assert!(!range.contains(999));
        assert!(range.contains(1000));
        assert!(range.contains(1999));
        assert!(!range.contains(2000));
    }

    #[test]
    fn test_empty_time_range() {
        let range = TimeRange::new(1000, 1000);
        assert!(range.is_empty());
        assert!(!range.contains(1000));
    }
}
