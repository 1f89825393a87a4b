//! Transfer Service - the operations behind each API endpoint

use crate::error::{BridgeError, Result};
use crate::identifier::validate_table_name;
use crate::ingestion::projector::project_all;
use crate::ingestion::{run_blocking, IngestionOrchestrator};
use crate::model::{validate_selection, ColumnDescriptor, Delimiter, EndpointConfig, Row, TransferRequest, TransferResult};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub struct TransferService {
    orchestrator: IngestionOrchestrator,
}

impl TransferService {
    pub fn new(orchestrator: IngestionOrchestrator) -> Self {
        Self { orchestrator }
    }

    pub fn orchestrator(&self) -> &IngestionOrchestrator {
        &self.orchestrator
    }

    /// Store sources list their tables; file sources connect trivially and return `None`.
    pub async fn connect(&self, config: &EndpointConfig) -> Result<Option<Vec<String>>> {
        match config {
            EndpointConfig::Store(store_config) => {
                let store = self.orchestrator.stores().open(store_config)?;
                let tables = store.list_tables().await?;
                info!("Connected to {} ({} tables)", store_config.endpoint, tables.len());
                Ok(Some(tables))
            }
            EndpointConfig::FileSource(_) | EndpointConfig::FileDestination(_) => Ok(None),
        }
    }

    /// Fresh managed file for an incoming upload.
    pub fn reserve_upload(&self, original_name: &str) -> Result<(PathBuf, File)> {
        self.orchestrator.files().reserve_upload(original_name)
    }

    /// Discover the columns of a stored upload, deleting it when it is unusable.
    pub async fn register_upload(&self, path: &Path, delimiter: Delimiter) -> Result<Vec<String>> {
        let files = self.orchestrator.files().clone();
        let read_path = path.to_path_buf();
        match run_blocking(move || files.discover_columns(&read_path, delimiter)).await {
            Ok(columns) => {
                info!("Upload {} has {} columns", path.display(), columns.len());
                Ok(columns)
            }
            Err(e) => {
                warn!("Rejecting upload {}: {}", path.display(), e);
                self.discard_upload(path);
                Err(e)
            }
        }
    }

    pub fn discard_upload(&self, path: &Path) {
        self.orchestrator.files().remove_artifact(path);
    }

    pub async fn describe(&self, config: &EndpointConfig, table: &str) -> Result<Vec<ColumnDescriptor>> {
        let EndpointConfig::Store(store_config) = config else {
            return Err(BridgeError::Validation(
                "Schema lookup is only available for clickhouse sources".to_string(),
            ));
        };
        validate_table_name(table)?;
        let store = self.orchestrator.stores().open(store_config)?;
        store.describe_table(table).await
    }

    /// Up to the configured preview limit of projected rows from either source kind.
    pub async fn preview(&self, source: &EndpointConfig, table: Option<&str>, columns: &[String]) -> Result<Vec<Row>> {
        validate_selection(columns)?;
        let limit = self.orchestrator.options().preview_limit;

        let rows = match source {
            EndpointConfig::Store(store_config) => {
                let table = validate_table_name(table.unwrap_or(""))?;
                let store = self.orchestrator.stores().open(store_config)?;
                store.select_rows(table, columns, Some(limit as u64)).await?
            }
            EndpointConfig::FileSource(file_config) => {
                let path = self.orchestrator.files().resolve_source(&file_config.file_path)?;
                let files = self.orchestrator.files().clone();
                let delimiter = file_config.delimiter;
                run_blocking(move || files.sample_rows(&path, delimiter, limit)).await?
            }
            EndpointConfig::FileDestination(_) => {
                return Err(BridgeError::Validation("Invalid source type or configuration".to_string()));
            }
        };
        Ok(project_all(rows, columns))
    }

    pub async fn ingest(&self, request: TransferRequest) -> Result<TransferResult> {
        self.orchestrator.ingest(request).await
    }
}
