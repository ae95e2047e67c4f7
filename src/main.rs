//! Vigil CLI
//!
//! Command-line interface for the vigil metrics store:
//! - Initialize a store directory
//! - Show store statistics
//! - Query and export time ranges
//! - Run a retention prune

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vigil::config::{generate_default_config, Config};
use vigil::service::HistoryStore;

#[derive(Parser)]
#[command(name = "vigil")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Historical system-metrics store")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file path (default: standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the store directory
    Init,

    /// Show store statistics
    Stats,

    /// Query a time range
    Query {
        /// Range start: millis, RFC 3339, YYYY-MM-DD, or now-<N><h|d|w|m>
        start: String,
        /// Range end (exclusive), same forms; default: now
        #[arg(default_value = "now")]
        end: String,
    },

    /// Export a time range to CSV
    Export {
        /// Range start
        start: String,
        /// Range end (exclusive); default: now
        #[arg(default_value = "now")]
        end: String,
    },

    /// Delete snapshots older than the retention horizon
    Prune {
        /// Retention in days (default: configured value)
        #[arg(short, long)]
        days: Option<u32>,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };

    init_logging(&config);

    match cli.command {
        Commands::Init => {
            let store = HistoryStore::open(&config).await?;
            store.close().await?;
            println!("Initialized store at {}", config.storage.data_dir);
        }

        Commands::Stats => {
            let store = HistoryStore::open(&config).await?;
            let summary = store.summary().await;
            let stats = store.storage_stats().await;

            if cli.format == "json" {
                let mut value = serde_json::to_value(&summary)?;
                value["disk_bytes"] = stats.disk_bytes.into();
                value["memory_bytes"] = stats.memory_bytes.into();
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                println!("Records:  {}", summary.total_records);
                match (summary.oldest_timestamp, summary.newest_timestamp) {
                    (Some(oldest), Some(newest)) => {
                        println!("Oldest:   {}", oldest.to_rfc3339());
                        println!("Newest:   {}", newest.to_rfc3339());
                    }
                    _ => println!("Store is empty"),
                }
                println!("{}", stats);
            }
        }

        Commands::Query { start, end } => {
            let store = HistoryStore::open(&config).await?;
            let result = store.range(&start, &end).await?;

            if cli.format == "json" {
                println!("{}", serde_json::to_string_pretty(&result.snapshots)?);
            } else {
                println!(
                    "{:<8} {:<26} {:>8} {:>8} {:>8}",
                    "id", "timestamp", "cpu%", "mem%", "load"
                );
                for s in &result.snapshots {
                    println!(
                        "{:<8} {:<26} {:>8.1} {:>8.1} {:>8.2}",
                        s.id,
                        s.datetime().to_rfc3339(),
                        s.cpu_usage,
                        s.memory_usage,
                        s.system_load
                    );
                }
                println!("{} snapshots", result.snapshots.len());
            }
            if result.truncated {
                eprintln!("Warning: result truncated at the configured row cap");
            }
        }

        Commands::Export { start, end } => {
            let store = HistoryStore::open(&config).await?;
            let path = store.export(&start, &end).await?;
            println!("Exported to {}", path.display());
        }

        Commands::Prune { days } => {
            let store = HistoryStore::open(&config).await?;
            let deleted = match days {
                Some(d) => store.prune(d).await?,
                None => store.prune_default().await?,
            };
            store.close().await?;
            println!("Deleted {} snapshots", deleted);
        }

        Commands::Config { output } => {
            let content = generate_default_config();
            match output {
                Some(path) => {
                    std::fs::write(&path, content)?;
                    println!("Wrote config to {}", path.display());
                }
                None => print!("{}", content),
            }
        }
    }

    Ok(())
}

fn init_logging(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| format!("vigil={}", config.logging.level)),
    );

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
