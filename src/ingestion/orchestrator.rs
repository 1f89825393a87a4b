//! Ingestion Orchestrator - runs one full source -> destination transfer

use crate::error::{BridgeError, Result};
use crate::identifier::{validate_identifier, validate_table_name};
use crate::ingestion::connector::StoreConnector;
use crate::ingestion::csv_connector::CsvConnector;
use crate::ingestion::projector::project_all;
use crate::ingestion::run_blocking;
use crate::model::{
    validate_selection, EndpointConfig, EndpointKind, FileDestinationConfig, FileSourceConfig, StoreConfig,
    TransferRequest, TransferResult, TransferTarget,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub const DEFAULT_BATCH_SIZE: usize = 1000;
pub const DEFAULT_PREVIEW_LIMIT: usize = 100;

/// Options controlling batching and sampling
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IngestionOptions {
    pub batch_size: usize,
    pub preview_limit: usize,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            preview_limit: DEFAULT_PREVIEW_LIMIT,
        }
    }
}

/// Supported (source, destination) pairings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferDirection {
    StoreToFile,
    FileToStore,
}

impl TransferDirection {
    /// Same-kind pairs are rejected along with anything else off the table.
    pub fn resolve(source: EndpointKind, destination: EndpointKind) -> Result<Self> {
        match (source, destination) {
            (EndpointKind::TabularStore, EndpointKind::DelimitedFile) => Ok(TransferDirection::StoreToFile),
            (EndpointKind::DelimitedFile, EndpointKind::TabularStore) => Ok(TransferDirection::FileToStore),
            (s, d) => Err(BridgeError::UnsupportedDirection {
                source_kind: s.to_string(),
                destination_kind: d.to_string(),
            }),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferState {
    Idle,
    Reading,
    Writing,
    Done,
    Failed,
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransferState::Idle => "idle",
            TransferState::Reading => "reading",
            TransferState::Writing => "writing",
            TransferState::Done => "done",
            TransferState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// State of one transfer: `Idle -> Reading -> Writing -> Done`, with
/// `Failed` reachable from `Reading` or `Writing`.
#[derive(Debug)]
pub struct TransferRun {
    run_id: String,
    state: TransferState,
}

impl TransferRun {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            state: TransferState::Idle,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn state(&self) -> TransferState {
        self.state
    }

    pub fn advance(&mut self, next: TransferState) -> Result<()> {
        use TransferState::*;
        let legal = matches!(
            (self.state, next),
            (Idle, Reading) | (Reading, Writing) | (Writing, Done) | (Reading, Failed) | (Writing, Failed)
        );
        if !legal {
            return Err(BridgeError::Validation(format!(
                "Illegal transfer transition {} -> {}",
                self.state, next
            )));
        }
        info!(run_id = %self.run_id, "transfer {} -> {}", self.state, next);
        self.state = next;
        Ok(())
    }

    /// Moves to `Failed` when a read or write was under way; earlier failures leave the run idle.
    pub fn fail(&mut self) {
        if matches!(self.state, TransferState::Reading | TransferState::Writing) {
            let _ = self.advance(TransferState::Failed);
        }
    }
}

impl Default for TransferRun {
    fn default() -> Self {
        Self::new()
    }
}

/// Ingestion Orchestrator - coordinates reading, projection and batched writes
pub struct IngestionOrchestrator {
    files: CsvConnector,
    stores: Arc<dyn StoreConnector>,
    options: IngestionOptions,
}

impl IngestionOrchestrator {
    pub fn new(files: CsvConnector, stores: Arc<dyn StoreConnector>, options: IngestionOptions) -> Self {
        Self { files, stores, options }
    }

    pub fn files(&self) -> &CsvConnector {
        &self.files
    }

    pub fn stores(&self) -> &Arc<dyn StoreConnector> {
        &self.stores
    }

    pub fn options(&self) -> &IngestionOptions {
        &self.options
    }

    /// Run the full transfer described by `request`.
    ///
    /// No step is retried and nothing written before a failure is rolled
    /// back. A File -> Store run that fails after at least one batch landed
    /// reports [`BridgeError::PartialTransfer`] with the confirmed count.
    pub async fn ingest(&self, request: TransferRequest) -> Result<TransferResult> {
        validate_selection(&request.columns)?;
        let direction = TransferDirection::resolve(request.source.kind(), request.destination.kind())?;

        let mut run = TransferRun::new();
        info!(
            run_id = %run.run_id(),
            "Starting {:?} transfer of {} columns",
            direction,
            request.columns.len()
        );

        let outcome = match (&request.source, &request.destination) {
            (EndpointConfig::Store(src), EndpointConfig::FileDestination(dst)) => {
                self.store_to_file(&mut run, src, dst, request.table_name.as_deref(), &request.columns)
                    .await
            }
            (EndpointConfig::FileSource(src), EndpointConfig::Store(dst)) => {
                self.file_to_store(&mut run, src, dst, request.table_name.as_deref(), &request.columns)
                    .await
            }
            _ => Err(BridgeError::Validation(
                "Source and destination configurations do not match their roles".to_string(),
            )),
        };

        match outcome {
            Ok(result) => {
                run.advance(TransferState::Done)?;
                info!(
                    run_id = %run.run_id(),
                    "Transfer finished: {} records -> {}",
                    result.records_processed,
                    result.destination.identifier()
                );
                Ok(result)
            }
            Err(e) => {
                run.fail();
                error!(run_id = %run.run_id(), "Transfer failed: {}", e);
                Err(e)
            }
        }
    }

    async fn store_to_file(
        &self,
        run: &mut TransferRun,
        source: &StoreConfig,
        destination: &FileDestinationConfig,
        table: Option<&str>,
        columns: &[String],
    ) -> Result<TransferResult> {
        let table = validate_table_name(table.unwrap_or(""))?;
        for col in columns {
            validate_identifier(col)?;
        }
        let (file_name, path) = self.files.export_path(destination.file_name.as_deref(), table)?;
        let store = self.stores.open(source)?;

        run.advance(TransferState::Reading)?;
        let rows = store.select_rows(table, columns, None).await?;
        let rows = project_all(rows, columns);
        let fetched = rows.len() as u64;
        debug!(run_id = %run.run_id(), "Fetched {} rows from {}", fetched, table);

        run.advance(TransferState::Writing)?;
        let files = self.files.clone();
        let delimiter = destination.delimiter;
        let cols = columns.to_vec();
        run_blocking(move || files.write_rows(&path, delimiter, &cols, rows)).await?;

        Ok(TransferResult {
            run_id: run.run_id().to_string(),
            records_processed: fetched,
            destination: TransferTarget::File(file_name),
        })
    }

    async fn file_to_store(
        &self,
        run: &mut TransferRun,
        source: &FileSourceConfig,
        destination: &StoreConfig,
        table: Option<&str>,
        columns: &[String],
    ) -> Result<TransferResult> {
        let path = self.files.resolve_source(&source.file_path)?;
        let table = table
            .or(destination.table_name.as_deref())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("imported_{}", Utc::now().timestamp_millis()));
        validate_table_name(&table)?;
        for col in columns {
            validate_identifier(col)?;
        }
        let store = self.stores.open(destination)?;

        run.advance(TransferState::Reading)?;
        let files = self.files.clone();
        let delimiter = source.delimiter;
        let read_path = path.clone();
        let rows = match run_blocking(move || files.read_rows(&read_path, delimiter)).await {
            Ok(rows) => rows,
            Err(e) => {
                if is_malformed_input(&e) {
                    warn!(run_id = %run.run_id(), "Removing unreadable upload {}", path.display());
                    self.files.remove_artifact(&path);
                }
                return Err(e);
            }
        };
        let rows = project_all(rows, columns);
        debug!(run_id = %run.run_id(), "Read {} rows from {}", rows.len(), path.display());

        run.advance(TransferState::Writing)?;
        store.ensure_table(&table, columns).await?;

        let batch_size = self.options.batch_size.max(1);
        let mut processed = 0u64;
        for (idx, batch) in rows.chunks(batch_size).enumerate() {
            if let Err(e) = store.insert_batch(&table, batch).await {
                if processed == 0 {
                    return Err(e);
                }
                return Err(BridgeError::PartialTransfer {
                    records_processed: processed,
                    destination: table,
                    cause: Box::new(e),
                });
            }
            processed += batch.len() as u64;
            debug!(run_id = %run.run_id(), "Batch {} inserted ({} rows, {} total)", idx + 1, batch.len(), processed);
        }

        Ok(TransferResult {
            run_id: run.run_id().to_string(),
            records_processed: processed,
            destination: TransferTarget::Table(table),
        })
    }
}

/// Read failures that condemn the source file itself, as opposed to I/O trouble around it.
fn is_malformed_input(err: &BridgeError) -> bool {
    matches!(err, BridgeError::Format(_) | BridgeError::Csv(_))
}
