//! Vigil storage layer
//!
//! Core persistence for historical system-metrics snapshots:
//!
//! - **types**: Snapshot record model (SystemSnapshot, DiskUsage, TimeRange)
//! - **wal**: Write-ahead log for durability
//! - **checkpoint**: Full-store checkpoint files
//! - **engine**: Storage engine orchestrating all components
//! - **error**: Error types
//!
//! # Architecture
//!
//! ```text
//! Write Path:
//!   SnapshotInput → Validate → WAL (fsync) → Memtable
//!
//! Read Path:
//!   TimeRange → B-tree range scan → Owned copies
//!
//! Recovery:
//!   Checkpoint frames + WAL replay (appends and delete tombstones)
//! ```

pub mod checkpoint;
pub mod engine;
pub mod error;
pub mod types;
pub mod wal;

// Re-export commonly used types
pub use engine::{StorageConfig, StorageEngine, StorageStats};
pub use error::{StorageError, StorageResult};
pub use types::{DiskUsage, NetworkTraffic, SnapshotInput, SystemSnapshot, TimeRange};
pub use wal::{WalRecord, WalSyncMode, WriteAheadLog};
