//! ClickHouse Store - tabular store adapter over the ClickHouse HTTP interface
//!
//! Every statement is POSTed as the request body to the configured endpoint.
//! Reads ask for `JSONEachRow` output (one JSON object per line) and inserts
//! send rows in the same format.

use crate::error::{BridgeError, Result};
use crate::identifier::{quote, validate_identifier, validate_table_name};
use crate::ingestion::connector::{StoreConnector, TabularStore};
use crate::model::{ColumnDescriptor, Row, StoreConfig};
use async_trait::async_trait;
use itertools::Itertools;
use reqwest::{Client, Url};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

const USER_HEADER: &str = "X-ClickHouse-User";
const KEY_HEADER: &str = "X-ClickHouse-Key";

/// Opens [`ClickHouseStore`] sessions.
#[derive(Clone, Debug)]
pub struct ClickHouseConnector {
    connect_timeout: Duration,
}

impl ClickHouseConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for ClickHouseConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

impl StoreConnector for ClickHouseConnector {
    fn open(&self, config: &StoreConfig) -> Result<Box<dyn TabularStore>> {
        Ok(Box::new(ClickHouseStore::new(config, self.connect_timeout)?))
    }
}

pub struct ClickHouseStore {
    endpoint: Url,
    user: String,
    key: String,
    client: Client,
}

impl ClickHouseStore {
    /// Validate the credential triple and endpoint URL and build a client.
    ///
    /// Only the connect phase is bounded; a running query may take as long
    /// as the server needs.
    pub fn new(config: &StoreConfig, connect_timeout: Duration) -> Result<Self> {
        config.validate()?;

        let endpoint = Url::parse(config.endpoint.trim())
            .map_err(|e| BridgeError::Remote(format!("Malformed endpoint URL '{}': {}", config.endpoint, e)))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(BridgeError::Remote(format!(
                "Unsupported endpoint scheme '{}'",
                endpoint.scheme()
            )));
        }

        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .tcp_keepalive(Duration::from_secs(60))
            .build()
            .map_err(|e| BridgeError::Connection(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            endpoint,
            user: config.key_id.clone(),
            key: config.key_secret.clone(),
            client,
        })
    }

    async fn execute(&self, sql: String) -> Result<String> {
        debug!("ClickHouse statement: {}", sql.lines().next().unwrap_or(""));

        let response = self
            .client
            .post(self.endpoint.clone())
            .header(USER_HEADER, &self.user)
            .header(KEY_HEADER, &self.key)
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(sql)
            .send()
            .await
            .map_err(|e| BridgeError::Remote(format!("Failed to reach ClickHouse: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| BridgeError::Remote(format!("Failed to read ClickHouse response: {}", e)))?;

        if !status.is_success() {
            return Err(BridgeError::Remote(format!(
                "ClickHouse returned {}: {}",
                status,
                text.trim()
            )));
        }
        Ok(text)
    }

    async fn query_rows(&self, sql: String) -> Result<Vec<Row>> {
        let body = self.execute(sql).await?;
        parse_json_each_row(&body)
    }
}

#[async_trait]
impl TabularStore for ClickHouseStore {
    async fn list_tables(&self) -> Result<Vec<String>> {
        let rows = self.query_rows(list_tables_sql()).await?;
        let tables = rows
            .into_iter()
            .filter_map(|row| row.into_iter().next().map(|(_, v)| value_text(v)))
            .collect::<Vec<_>>();
        info!("ClickHouse listed {} tables", tables.len());
        Ok(tables)
    }

    async fn describe_table(&self, table: &str) -> Result<Vec<ColumnDescriptor>> {
        let rows = self.query_rows(describe_sql(table)?).await?;
        rows.into_iter()
            .map(|mut row| {
                let name = row
                    .remove("name")
                    .map(value_text)
                    .ok_or_else(|| BridgeError::Remote("DESCRIBE output has no 'name' field".to_string()))?;
                let data_type = row.remove("type").map(value_text);
                Ok(ColumnDescriptor {
                    name,
                    data_type,
                    selected: false,
                })
            })
            .collect()
    }

    async fn select_rows(&self, table: &str, columns: &[String], limit: Option<u64>) -> Result<Vec<Row>> {
        self.query_rows(select_sql(table, columns, limit)?).await
    }

    async fn ensure_table(&self, table: &str, columns: &[String]) -> Result<()> {
        self.execute(create_table_sql(table, columns)?).await?;
        Ok(())
    }

    async fn insert_batch(&self, table: &str, rows: &[Row]) -> Result<()> {
        let Some(first) = rows.first() else {
            return Ok(());
        };
        let columns: Vec<String> = first.keys().cloned().collect();

        let mut body = insert_sql(table, &columns)?;
        for row in rows {
            body.push('\n');
            body.push_str(&serde_json::to_string(row)?);
        }
        self.execute(body).await?;
        Ok(())
    }
}

pub fn list_tables_sql() -> String {
    "SHOW TABLES FORMAT JSONEachRow".to_string()
}

pub fn describe_sql(table: &str) -> Result<String> {
    validate_table_name(table)?;
    Ok(format!("DESCRIBE TABLE {} FORMAT JSONEachRow", quote(table)))
}

fn column_list(columns: &[String]) -> Result<String> {
    if columns.is_empty() {
        return Err(BridgeError::Validation("No columns selected".to_string()));
    }
    for col in columns {
        validate_identifier(col)?;
    }
    Ok(columns.iter().map(|c| quote(c)).join(", "))
}

pub fn select_sql(table: &str, columns: &[String], limit: Option<u64>) -> Result<String> {
    validate_table_name(table)?;
    let cols = column_list(columns)?;
    let limit = limit.map(|n| format!(" LIMIT {}", n)).unwrap_or_default();
    Ok(format!(
        "SELECT {} FROM {}{} FORMAT JSONEachRow",
        cols,
        quote(table),
        limit
    ))
}

pub fn create_table_sql(table: &str, columns: &[String]) -> Result<String> {
    validate_table_name(table)?;
    column_list(columns)?;
    let defs = columns.iter().map(|c| format!("{} String", quote(c))).join(", ");
    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {} ({}) ENGINE = MergeTree() ORDER BY tuple()",
        quote(table),
        defs
    ))
}

pub fn insert_sql(table: &str, columns: &[String]) -> Result<String> {
    validate_table_name(table)?;
    let cols = column_list(columns)?;
    Ok(format!("INSERT INTO {} ({}) FORMAT JSONEachRow", quote(table), cols))
}

/// One JSON object per non-empty line, key order preserved.
pub fn parse_json_each_row(body: &str) -> Result<Vec<Row>> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| match serde_json::from_str::<Value>(line) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(BridgeError::Remote(format!("Expected a JSON object per row, got {}", other))),
            Err(e) => Err(BridgeError::Remote(format!("Malformed JSONEachRow line: {}", e))),
        })
        .collect()
}

fn value_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}
