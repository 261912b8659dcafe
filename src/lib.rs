pub mod cli;
pub mod config;
pub mod dataset;
pub mod env_file;
pub mod error;
pub mod generate;
pub mod records;
pub mod store;
pub mod vision;
pub mod warehouse;

pub use error::{ConfigError, DownloadError, FetchError, StoreError};
pub use records::{PriceExtremum, PriceMap, SentimentTick, SymbolRecord};

use clap::Parser;
use std::path::PathBuf;

/// Builds the fear-index dataset straight from the MySQL warehouse.
#[derive(Parser, Debug, Clone)]
#[command(version, about = "Fear index + daily price extrema CSV exporter")]
pub struct ExportArgs {
    /// Env file with DATABASE_HOST, DATABASE_PORT, DATABASE_USER, DATABASE_PASSWORD, DATABASE_DBNAME
    #[arg(long, default_value = ".env")]
    pub env_file: PathBuf,

    /// Output CSV path
    #[arg(long, default_value = dataset::DEFAULT_DATASET_PATH)]
    pub out: PathBuf,

    /// Exchange name substring (case-insensitive) selecting the symbol columns
    #[arg(long, default_value = "binance")]
    pub venue: String,

    /// Also write <out>.manifest.json describing the export
    #[arg(long)]
    pub write_manifest: bool,

    /// Optional lock file path to prevent concurrent exports
    #[arg(long)]
    pub lock_file: Option<PathBuf>,
}
