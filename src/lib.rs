//! Vigil: a historical system-metrics store
//!
//! Stores periodic system snapshots (CPU, memory, load, per-mount disk
//! usage, network counters) durably on disk and answers time-range
//! queries over them. Built for dashboard backends that sample the host
//! every few seconds and chart hours to months of history.
//!
//! Layers, bottom up:
//! - [`storage`]: WAL + checkpoint persistence and the ordered memtable
//! - [`query`]: validated half-open range scans with a row cap
//! - [`retention`]: age-based pruning
//! - [`export`]: flattened CSV export of query results
//! - [`stats`]: store summaries
//! - [`service`]: the [`service::HistoryStore`] facade tying it together
//!
//! ```no_run
//! use vigil::config::Config;
//! use vigil::service::HistoryStore;
//! use vigil::storage::SnapshotInput;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = HistoryStore::open(&Config::default()).await?;
//! store.append(SnapshotInput::new(12.5, 48.0, 16_000_000_000, 0.7)).await?;
//! let result = store.range("now-1h", "now").await?;
//! println!("{} snapshots in the last hour", result.snapshots.len());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod export;
pub mod query;
pub mod retention;
pub mod service;
pub mod stats;
pub mod storage;

pub use config::Config;
pub use service::HistoryStore;
pub use stats::StoreSummary;
pub use storage::{DiskUsage, NetworkTraffic, SnapshotInput, SystemSnapshot};
