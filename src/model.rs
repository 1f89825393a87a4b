//! Transfer data model - endpoint kinds, their configurations, and the
//! request/result shapes exchanged with the ingestion pipeline.

use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// A row keyed by column name. Key order is the column order.
pub type Row = Map<String, Value>;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EndpointKind {
    #[serde(rename = "clickhouse")]
    TabularStore,
    #[serde(rename = "flatfile")]
    DelimitedFile,
}

impl EndpointKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointKind::TabularStore => "clickhouse",
            EndpointKind::DelimitedFile => "flatfile",
        }
    }
}

impl fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EndpointKind {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "clickhouse" => Ok(EndpointKind::TabularStore),
            "flatfile" => Ok(EndpointKind::DelimitedFile),
            other => Err(BridgeError::Validation(format!("Invalid source type: '{}'", other))),
        }
    }
}

/// Which side of a transfer a configuration was supplied for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Source,
    Destination,
}

/// Single-byte field separator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Delimiter(u8);

impl Delimiter {
    pub fn byte(&self) -> u8 {
        self.0
    }
}

impl Default for Delimiter {
    fn default() -> Self {
        Delimiter(b',')
    }
}

impl FromStr for Delimiter {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "" => Ok(Delimiter::default()),
            "\\t" | "tab" => Ok(Delimiter(b'\t')),
            _ if s.len() == 1 && s.is_ascii() && s != "\"" && s != "\n" && s != "\r" => {
                Ok(Delimiter(s.as_bytes()[0]))
            }
            _ => Err(BridgeError::Validation(format!(
                "Delimiter must be a single ASCII character, got '{}'",
                s
            ))),
        }
    }
}

impl TryFrom<String> for Delimiter {
    type Error = BridgeError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Delimiter> for String {
    fn from(d: Delimiter) -> Self {
        if d.0 == b'\t' {
            "\\t".to_string()
        } else {
            (d.0 as char).to_string()
        }
    }
}

/// Connection settings for the ClickHouse HTTP interface.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreConfig {
    pub endpoint: String,
    pub key_id: String,
    pub key_secret: String,

    /// Target table when the store is the destination of a file import.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
}

impl StoreConfig {
    /// All three of endpoint, key id and key secret must be present.
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = [
            ("endpoint", &self.endpoint),
            ("keyId", &self.key_id),
            ("keySecret", &self.key_secret),
        ]
        .iter()
        .filter(|(_, v)| v.trim().is_empty())
        .map(|(k, _)| *k)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(BridgeError::Connection(format!(
                "Missing required connection parameters: {}",
                missing.join(", ")
            )))
        }
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("endpoint", &self.endpoint)
            .field("key_id", &self.key_id)
            .field("key_secret", &"***")
            .field("table_name", &self.table_name)
            .finish()
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct FileSourceConfig {
    pub file_path: PathBuf,
    pub delimiter: Delimiter,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct FileDestinationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    pub delimiter: Delimiter,
}

/// Configuration for one side of a transfer, shaped by endpoint kind and role.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EndpointConfig {
    Store(StoreConfig),
    FileSource(FileSourceConfig),
    FileDestination(FileDestinationConfig),
}

impl EndpointConfig {
    /// Decode a loosely shaped JSON config into the variant for `kind` and `role`.
    pub fn from_wire(kind: EndpointKind, role: Role, value: Value) -> Result<Self> {
        let value = if value.is_null() { Value::Object(Map::new()) } else { value };
        let config = match (kind, role) {
            (EndpointKind::TabularStore, _) => EndpointConfig::Store(decode(value, kind)?),
            (EndpointKind::DelimitedFile, Role::Source) => EndpointConfig::FileSource(decode(value, kind)?),
            (EndpointKind::DelimitedFile, Role::Destination) => {
                EndpointConfig::FileDestination(decode(value, kind)?)
            }
        };
        Ok(config)
    }

    pub fn kind(&self) -> EndpointKind {
        match self {
            EndpointConfig::Store(_) => EndpointKind::TabularStore,
            EndpointConfig::FileSource(_) | EndpointConfig::FileDestination(_) => EndpointKind::DelimitedFile,
        }
    }
}

fn decode<T: serde::de::DeserializeOwned>(value: Value, kind: EndpointKind) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| BridgeError::Validation(format!("Invalid {} configuration: {}", kind, e)))
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: String,

    /// Store-reported type label; absent for flat files.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub selected: bool,
}

impl ColumnDescriptor {
    pub fn untyped(name: impl Into<String>) -> Self {
        Self { name: name.into(), data_type: None, selected: false }
    }

    pub fn typed(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self { name: name.into(), data_type: Some(data_type.into()), selected: false }
    }
}

/// Ordered, non-empty, duplicate-free column selection.
pub fn validate_selection(columns: &[String]) -> Result<()> {
    if columns.is_empty() {
        return Err(BridgeError::Validation("No columns selected".to_string()));
    }
    let mut seen = HashSet::new();
    for col in columns {
        if !seen.insert(col.as_str()) {
            return Err(BridgeError::Validation(format!("Column '{}' selected more than once", col)));
        }
    }
    Ok(())
}

#[derive(Clone, Debug)]
pub struct TransferRequest {
    pub source: EndpointConfig,
    pub destination: EndpointConfig,
    pub table_name: Option<String>,
    pub columns: Vec<String>,
}

/// Where the rows of a finished transfer ended up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransferTarget {
    File(String),
    Table(String),
}

impl TransferTarget {
    pub fn identifier(&self) -> &str {
        match self {
            TransferTarget::File(name) | TransferTarget::Table(name) => name,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferResult {
    pub run_id: String,
    pub records_processed: u64,
    pub destination: TransferTarget,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_endpoint_kind_wire_names() {
        assert_eq!("clickhouse".parse::<EndpointKind>().unwrap(), EndpointKind::TabularStore);
        assert_eq!("flatfile".parse::<EndpointKind>().unwrap(), EndpointKind::DelimitedFile);
        assert!("postgres".parse::<EndpointKind>().is_err());
        assert_eq!(serde_json::to_value(EndpointKind::DelimitedFile).unwrap(), json!("flatfile"));
    }

    #[test]
    fn test_delimiter_parsing() {
        assert_eq!("".parse::<Delimiter>().unwrap().byte(), b',');
        assert_eq!(";".parse::<Delimiter>().unwrap().byte(), b';');
        assert_eq!("|".parse::<Delimiter>().unwrap().byte(), b'|');
        assert_eq!("\\t".parse::<Delimiter>().unwrap().byte(), b'\t');
        assert_eq!("tab".parse::<Delimiter>().unwrap().byte(), b'\t');
        assert!(";;".parse::<Delimiter>().is_err());
        assert!("\"".parse::<Delimiter>().is_err());
        assert!("é".parse::<Delimiter>().is_err());
    }

    #[test]
    fn test_store_config_missing_fields() {
        let config = StoreConfig {
            endpoint: "https://ch.example.com:8443".into(),
            key_id: "".into(),
            key_secret: "secret".into(),
            table_name: None,
        };
        match config.validate() {
            Err(BridgeError::Connection(msg)) => assert!(msg.contains("keyId")),
            other => panic!("expected connection error, got {:?}", other),
        }
    }

    #[test]
    fn test_store_config_debug_hides_secret() {
        let config = StoreConfig {
            endpoint: "https://ch".into(),
            key_id: "id".into(),
            key_secret: "hunter2".into(),
            table_name: None,
        };
        assert!(!format!("{:?}", config).contains("hunter2"));
    }

    #[test]
    fn test_from_wire_by_role() {
        let src = EndpointConfig::from_wire(
            EndpointKind::DelimitedFile,
            Role::Source,
            json!({"filePath": "/data/a.csv", "delimiter": ";"}),
        )
        .unwrap();
        match src {
            EndpointConfig::FileSource(cfg) => {
                assert_eq!(cfg.file_path, PathBuf::from("/data/a.csv"));
                assert_eq!(cfg.delimiter.byte(), b';');
            }
            other => panic!("unexpected {:?}", other),
        }

        let dst = EndpointConfig::from_wire(EndpointKind::DelimitedFile, Role::Destination, json!({"fileName": "out.csv"}))
            .unwrap();
        assert_eq!(
            dst,
            EndpointConfig::FileDestination(FileDestinationConfig {
                file_name: Some("out.csv".into()),
                delimiter: Delimiter::default(),
            })
        );

        let store = EndpointConfig::from_wire(EndpointKind::TabularStore, Role::Source, Value::Null).unwrap();
        assert_eq!(store.kind(), EndpointKind::TabularStore);
    }

    #[test]
    fn test_from_wire_rejects_bad_delimiter() {
        let err = EndpointConfig::from_wire(
            EndpointKind::DelimitedFile,
            Role::Source,
            json!({"filePath": "a.csv", "delimiter": "::"}),
        )
        .unwrap_err();
        assert!(matches!(err, BridgeError::Validation(_)));
    }

    #[test]
    fn test_validate_selection() {
        assert!(validate_selection(&[]).is_err());
        assert!(validate_selection(&["id".into(), "id".into()]).is_err());
        assert!(validate_selection(&["id".into(), "name".into()]).is_ok());
    }

    #[test]
    fn test_column_descriptor_serialization() {
        let col = ColumnDescriptor::typed("id", "UInt32");
        assert_eq!(serde_json::to_value(&col).unwrap(), json!({"name": "id", "type": "UInt32"}));
        let mut flat = ColumnDescriptor::untyped("name");
        flat.selected = true;
        assert_eq!(serde_json::to_value(&flat).unwrap(), json!({"name": "name", "selected": true}));
    }
}
