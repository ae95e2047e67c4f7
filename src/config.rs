//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::storage::WalSyncMode;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageSettings,

    #[serde(default)]
    pub export: ExportSettings,

    #[serde(default)]
    pub retention: RetentionSettings,

    #[serde(default)]
    pub query: QuerySettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Storage engine configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// WAL sync strategy: "every_write", "batched", or "none"
    #[serde(default = "default_wal_sync")]
    pub wal_sync: String,

    #[serde(default = "default_checkpoint_threshold")]
    pub checkpoint_threshold_bytes: u64,
}

fn default_data_dir() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("vigil").to_string_lossy().to_string())
        .unwrap_or_else(|| "./vigil_data".to_string())
}

fn default_wal_sync() -> String {
    "batched".to_string()
}

fn default_checkpoint_threshold() -> u64 {
    8 * 1024 * 1024 // 8 MB
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            wal_sync: default_wal_sync(),
            checkpoint_threshold_bytes: default_checkpoint_threshold(),
        }
    }
}

impl StorageSettings {
    /// WAL sync mode parsed from the config string
    ///
    /// Unknown values fall back to batched syncing.
    pub fn wal_sync_mode(&self) -> WalSyncMode {
        match self.wal_sync.as_str() {
            "every_write" => WalSyncMode::EveryWrite,
            "none" => WalSyncMode::None,
            "batched" => WalSyncMode::Batched,
            other => {
                tracing::warn!("Unknown wal_sync value {:?}, using batched", other);
                WalSyncMode::Batched
            }
        }
    }
}

/// CSV export configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ExportSettings {
    #[serde(default = "default_export_dir")]
    pub export_dir: String,
}

fn default_export_dir() -> String {
    dirs::download_dir()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|| "./exports".to_string())
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            export_dir: default_export_dir(),
        }
    }
}

/// Retention policy configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RetentionSettings {
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

fn default_retention_days() -> u32 {
    30
}

impl Default for RetentionSettings {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
        }
    }
}

/// Query engine configuration
#[derive(Debug, Clone, Deserialize)]
pub struct QuerySettings {
    /// Row cap for range queries; 0 disables the cap
    #[serde(default = "default_max_result_rows")]
    pub max_result_rows: usize,
}

fn default_max_result_rows() -> usize {
    crate::query::DEFAULT_MAX_RESULT_ROWS
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            max_result_rows: default_max_result_rows(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,

    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("vigil").join("config.toml")),
            Some(PathBuf::from("/etc/vigil/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        // Storage overrides
        if let Ok(data_dir) = std::env::var("VIGIL_DATA_DIR") {
            self.storage.data_dir = data_dir;
        }
        if let Ok(wal_sync) = std::env::var("VIGIL_WAL_SYNC") {
            self.storage.wal_sync = wal_sync;
        }

        // Export overrides
        if let Ok(export_dir) = std::env::var("VIGIL_EXPORT_DIR") {
            self.export.export_dir = export_dir;
        }

        // Retention overrides
        if let Ok(days) = std::env::var("VIGIL_RETENTION_DAYS") {
            if let Ok(d) = days.parse() {
                self.retention.retention_days = d;
            }
        }

        // Query overrides
        if let Ok(rows) = std::env::var("VIGIL_MAX_RESULT_ROWS") {
            if let Ok(r) = rows.parse() {
                self.query.max_result_rows = r;
            }
        }

        // Logging overrides
        if let Ok(level) = std::env::var("VIGIL_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("VIGIL_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageSettings::default(),
            export: ExportSettings::default(),
            retention: RetentionSettings::default(),
            query: QuerySettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Vigil Configuration
#
# Environment variables override these settings:
# - VIGIL_DATA_DIR
# - VIGIL_WAL_SYNC
# - VIGIL_EXPORT_DIR
# - VIGIL_RETENTION_DAYS
# - VIGIL_MAX_RESULT_ROWS
# - VIGIL_LOG_LEVEL
# - VIGIL_LOG_FORMAT

[storage]
# Directory for storing data files
data_dir = "~/.local/share/vigil"

# WAL sync strategy: every_write, batched, or none
wal_sync = "batched"

# WAL size that triggers a checkpoint (bytes)
checkpoint_threshold_bytes = 8388608

[export]
# Directory where CSV exports are written
export_dir = "~/Downloads"

[retention]
# Delete snapshots older than this many days
retention_days = 30

[query]
# Maximum rows a single range query returns; 0 disables the cap
max_result_rows = 500000

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"

# Optional log file path
# file = "/var/log/vigil/vigil.log"
"#
    .to_string()
}
