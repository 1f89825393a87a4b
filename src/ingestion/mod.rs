//! Ingestion Module - moves rows between a ClickHouse table and a delimited file
//!
//! - Delimited-file adapter (header discovery, sampling, full read, write)
//! - Tabular-store adapter over the ClickHouse HTTP interface
//! - Column projection
//! - Batched, sequential transfer orchestration

pub mod clickhouse;
pub mod connector;
pub mod csv_connector;
pub mod orchestrator;
pub mod projector;

pub use clickhouse::{ClickHouseConnector, ClickHouseStore};
pub use connector::{StoreConnector, TabularStore};
pub use csv_connector::CsvConnector;
pub use orchestrator::{IngestionOptions, IngestionOrchestrator, TransferDirection, TransferRun, TransferState};
pub use projector::project;

use crate::error::{BridgeError, Result};

/// Runs blocking file I/O off the async executor.
pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| BridgeError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?
}
