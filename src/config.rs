//! Server configuration from command-line flags with environment fallbacks.

use crate::ingestion::IngestionOptions;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(name = "tablebridge", about = "Move selected columns between ClickHouse tables and delimited files")]
pub struct AppConfig {
    /// Address the HTTP API listens on
    #[arg(long, env = "TABLEBRIDGE_BIND_ADDR", default_value = "0.0.0.0:3001")]
    pub bind_addr: String,

    /// Directory holding uploaded sources and exported files
    #[arg(long, env = "TABLEBRIDGE_STORAGE_DIR", default_value = "uploads")]
    pub storage_dir: PathBuf,

    /// Rows per ClickHouse insert call
    #[arg(long, env = "TABLEBRIDGE_BATCH_SIZE", default_value_t = 1000, value_parser = clap::value_parser!(u64).range(1..))]
    pub batch_size: u64,

    /// Maximum rows returned by a preview
    #[arg(long, env = "TABLEBRIDGE_PREVIEW_LIMIT", default_value_t = 100, value_parser = clap::value_parser!(u64).range(1..))]
    pub preview_limit: u64,

    /// Largest accepted request body, uploads included
    #[arg(long, env = "TABLEBRIDGE_MAX_UPLOAD_BYTES", default_value_t = 256 * 1024 * 1024)]
    pub max_upload_bytes: usize,

    /// Seconds allowed for establishing a ClickHouse connection
    #[arg(long, env = "TABLEBRIDGE_CONNECT_TIMEOUT_SECS", default_value_t = 10)]
    pub connect_timeout_secs: u64,
}

impl AppConfig {
    pub fn ingestion_options(&self) -> IngestionOptions {
        IngestionOptions {
            batch_size: self.batch_size as usize,
            preview_limit: self.preview_limit as usize,
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Creates the storage directory if needed and returns its canonical path.
    pub fn prepare_storage(&self) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(&self.storage_dir)?;
        self.storage_dir.canonicalize()
    }
}
