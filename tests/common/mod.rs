//! In-memory tabular store shared by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tablebridge::error::{BridgeError, Result};
use tablebridge::ingestion::{CsvConnector, IngestionOptions, IngestionOrchestrator, StoreConnector, TabularStore};
use tablebridge::model::{ColumnDescriptor, Row, StoreConfig};

#[derive(Default)]
pub struct MemoryTable {
    pub columns: Vec<(String, String)>,
    pub rows: Vec<Row>,
}

#[derive(Default)]
pub struct MemoryState {
    pub tables: BTreeMap<String, MemoryTable>,
    pub ensure_calls: usize,
    pub insert_calls: Vec<usize>,
    /// Zero-based insert call that should be rejected.
    pub fail_insert_call: Option<usize>,
}

#[derive(Clone, Default)]
pub struct MemoryConnector {
    pub state: Arc<Mutex<MemoryState>>,
}

impl MemoryConnector {
    pub fn with_table(self, name: &str, columns: &[(&str, &str)], rows: Vec<Row>) -> Self {
        self.state.lock().unwrap().tables.insert(
            name.to_string(),
            MemoryTable {
                columns: columns.iter().map(|(n, t)| (n.to_string(), t.to_string())).collect(),
                rows,
            },
        );
        self
    }

    pub fn fail_insert_call(self, call: usize) -> Self {
        self.state.lock().unwrap().fail_insert_call = Some(call);
        self
    }

    pub fn insert_calls(&self) -> Vec<usize> {
        self.state.lock().unwrap().insert_calls.clone()
    }

    pub fn ensure_calls(&self) -> usize {
        self.state.lock().unwrap().ensure_calls
    }

    pub fn table_rows(&self, name: &str) -> Vec<Row> {
        self.state
            .lock()
            .unwrap()
            .tables
            .get(name)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    pub fn table_names(&self) -> Vec<String> {
        self.state.lock().unwrap().tables.keys().cloned().collect()
    }
}

impl StoreConnector for MemoryConnector {
    fn open(&self, config: &StoreConfig) -> Result<Box<dyn TabularStore>> {
        config.validate()?;
        Ok(Box::new(MemoryStore {
            state: self.state.clone(),
        }))
    }
}

pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

fn missing(table: &str) -> BridgeError {
    BridgeError::Remote(format!("Table {} does not exist", table))
}

#[async_trait]
impl TabularStore for MemoryStore {
    async fn list_tables(&self) -> Result<Vec<String>> {
        Ok(self.state.lock().unwrap().tables.keys().cloned().collect())
    }

    async fn describe_table(&self, table: &str) -> Result<Vec<ColumnDescriptor>> {
        let state = self.state.lock().unwrap();
        let t = state.tables.get(table).ok_or_else(|| missing(table))?;
        Ok(t.columns.iter().map(|(n, ty)| ColumnDescriptor::typed(n.clone(), ty.clone())).collect())
    }

    async fn select_rows(&self, table: &str, columns: &[String], limit: Option<u64>) -> Result<Vec<Row>> {
        let state = self.state.lock().unwrap();
        let t = state.tables.get(table).ok_or_else(|| missing(table))?;
        for col in columns {
            if !t.columns.iter().any(|(n, _)| n == col) {
                return Err(BridgeError::Remote(format!("Unknown column {}", col)));
            }
        }
        let take = limit.map(|l| l as usize).unwrap_or(usize::MAX);
        Ok(t.rows
            .iter()
            .take(take)
            .map(|row| {
                columns
                    .iter()
                    .map(|c| (c.clone(), row.get(c).cloned().unwrap_or(Value::Null)))
                    .collect()
            })
            .collect())
    }

    async fn ensure_table(&self, table: &str, columns: &[String]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.ensure_calls += 1;
        state.tables.entry(table.to_string()).or_insert_with(|| MemoryTable {
            columns: columns.iter().map(|c| (c.clone(), "String".to_string())).collect(),
            rows: Vec::new(),
        });
        Ok(())
    }

    async fn insert_batch(&self, table: &str, rows: &[Row]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let call = state.insert_calls.len();
        if state.fail_insert_call == Some(call) {
            return Err(BridgeError::Remote(format!("Insert call {} rejected", call)));
        }
        let t = state.tables.get_mut(table).ok_or_else(|| missing(table))?;
        for row in rows {
            if row.keys().any(|k| !t.columns.iter().any(|(n, _)| n == k)) {
                return Err(BridgeError::Remote("Row shape does not match table".to_string()));
            }
        }
        t.rows.extend(rows.iter().cloned());
        state.insert_calls.push(rows.len());
        Ok(())
    }
}

pub fn store_config() -> StoreConfig {
    StoreConfig {
        endpoint: "http://clickhouse.test:8123".to_string(),
        key_id: "default".to_string(),
        key_secret: "secret".to_string(),
        table_name: None,
    }
}

pub fn orchestrator(root: &Path, connector: MemoryConnector, batch_size: usize) -> IngestionOrchestrator {
    IngestionOrchestrator::new(
        CsvConnector::new(root),
        Arc::new(connector),
        IngestionOptions {
            batch_size,
            ..IngestionOptions::default()
        },
    )
}

/// `id,name` file with `rows` data lines.
pub fn people_csv(root: &Path, file: &str, rows: usize) -> PathBuf {
    let mut text = String::from("id,name\n");
    for i in 1..=rows {
        text.push_str(&format!("{},person_{}\n", i, i));
    }
    let path = root.join(file);
    std::fs::write(&path, text).unwrap();
    path
}

pub fn row(value: Value) -> Row {
    value.as_object().cloned().unwrap()
}

pub fn cols(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}
