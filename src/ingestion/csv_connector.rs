//! CSV Connector - reads and writes delimited files under the managed storage root

use crate::error::{BridgeError, Result};
use crate::model::{Delimiter, Row};
use chrono::Utc;
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const DEFAULT_UPLOAD_NAME: &str = "upload.csv";

/// Delimited-file adapter bound to one storage root.
///
/// Uploaded sources and exported destinations both live directly under the
/// root; client-supplied source paths are only honoured inside it.
#[derive(Clone, Debug)]
pub struct CsvConnector {
    storage_root: PathBuf,
}

impl CsvConnector {
    pub fn new(storage_root: impl Into<PathBuf>) -> Self {
        Self {
            storage_root: storage_root.into(),
        }
    }

    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    fn reader(path: &Path, delimiter: Delimiter) -> Result<csv::Reader<File>> {
        let reader = ReaderBuilder::new()
            .has_headers(true)
            .delimiter(delimiter.byte())
            .flexible(true)
            .from_reader(File::open(path)?);
        Ok(reader)
    }

    fn headers(reader: &mut csv::Reader<File>) -> Result<Vec<String>> {
        let headers = reader
            .headers()
            .map_err(|e| BridgeError::Format(format!("Failed to read header: {}", e)))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect::<Vec<_>>();
        Ok(headers)
    }

    fn record_to_row(headers: &[String], record: &StringRecord) -> Row {
        headers
            .iter()
            .enumerate()
            .map(|(idx, header)| {
                let value = record
                    .get(idx)
                    .map(|cell| Value::String(cell.trim().to_string()))
                    .unwrap_or(Value::Null);
                (header.clone(), value)
            })
            .collect()
    }

    /// A whitespace-only line. Empty lines never reach here, and rows of empty
    /// fields (`,` or a quoted `""`) are data.
    fn is_blank_line(record: &StringRecord) -> bool {
        record.len() == 1
            && record
                .get(0)
                .map_or(false, |field| !field.is_empty() && field.trim().is_empty())
    }

    fn read_limited(&self, path: &Path, delimiter: Delimiter, limit: Option<usize>) -> Result<Vec<Row>> {
        let mut reader = Self::reader(path, delimiter)?;
        let headers = Self::headers(&mut reader)?;

        let mut rows = Vec::new();
        let mut record = StringRecord::new();
        while limit.map_or(true, |max| rows.len() < max) {
            let more = reader
                .read_record(&mut record)
                .map_err(|e| BridgeError::Format(format!("Failed to read record: {}", e)))?;
            if !more {
                break;
            }
            if Self::is_blank_line(&record) {
                continue;
            }
            rows.push(Self::record_to_row(&headers, &record));
        }
        Ok(rows)
    }

    /// Column names from the header; requires at least one data row.
    pub fn discover_columns(&self, path: &Path, delimiter: Delimiter) -> Result<Vec<String>> {
        let mut reader = Self::reader(path, delimiter)?;
        let headers = Self::headers(&mut reader)?;

        let mut record = StringRecord::new();
        loop {
            let more = reader
                .read_record(&mut record)
                .map_err(|e| BridgeError::Format(format!("Failed to read record: {}", e)))?;
            if !more {
                return Err(BridgeError::Format("File is empty or has no valid data".to_string()));
            }
            if !Self::is_blank_line(&record) {
                break;
            }
        }

        if headers.iter().all(|h| h.is_empty()) {
            return Err(BridgeError::Format("File has no header columns".to_string()));
        }
        Ok(headers)
    }

    /// Header plus up to `max_rows` non-blank data rows.
    pub fn sample_rows(&self, path: &Path, delimiter: Delimiter, max_rows: usize) -> Result<Vec<Row>> {
        self.read_limited(path, delimiter, Some(max_rows))
    }

    /// Every non-blank data row in the file.
    pub fn read_rows(&self, path: &Path, delimiter: Delimiter) -> Result<Vec<Row>> {
        self.read_limited(path, delimiter, None)
    }

    /// Writes a header from `columns`, then one line per row in column order.
    ///
    /// The destination is created or truncated. The count is returned only
    /// after the file has been flushed and synced.
    pub fn write_rows<I>(&self, path: &Path, delimiter: Delimiter, columns: &[String], rows: I) -> Result<u64>
    where
        I: IntoIterator<Item = Row>,
    {
        let mut writer = WriterBuilder::new()
            .delimiter(delimiter.byte())
            .from_path(path)?;
        writer.write_record(columns)?;

        let mut count = 0u64;
        for row in rows {
            writer.write_record(columns.iter().map(|col| cell_text(row.get(col))))?;
            count += 1;
        }

        let file = writer.into_inner().map_err(|e| BridgeError::Io(e.into_error()))?;
        file.sync_all()?;
        debug!("Wrote {} rows to {}", count, path.display());
        Ok(count)
    }

    /// Creates a fresh `{unix_millis}-{name}` file for an upload.
    pub fn reserve_upload(&self, original_name: &str) -> Result<(PathBuf, File)> {
        let name = sanitize_file_name(original_name);
        let mut stamp = Utc::now().timestamp_millis();
        loop {
            let path = self.storage_root.join(format!("{}-{}", stamp, name));
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => stamp += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Destination path for an export, named by the caller or `{table}_export_{unix_millis}.csv`.
    pub fn export_path(&self, file_name: Option<&str>, table: &str) -> Result<(String, PathBuf)> {
        let name = match file_name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => {
                if name.contains('/') || name.contains('\\') || name == "." || name == ".." {
                    return Err(BridgeError::Validation(format!(
                        "Output file name '{}' must be a bare file name",
                        name
                    )));
                }
                name.to_string()
            }
            None => format!("{}_export_{}.csv", table, Utc::now().timestamp_millis()),
        };
        let path = self.storage_root.join(&name);
        Ok((name, path))
    }

    /// Canonical path of a source file, which must exist inside the storage root.
    pub fn resolve_source(&self, path: &Path) -> Result<PathBuf> {
        if path.as_os_str().is_empty() {
            return Err(BridgeError::Validation("Source file path is missing".to_string()));
        }
        let candidate = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.storage_root.join(path)
        };
        let resolved = candidate
            .canonicalize()
            .map_err(|_| BridgeError::Validation(format!("Source file not found: {}", path.display())))?;
        let root = self.storage_root.canonicalize()?;
        if !resolved.starts_with(&root) || !resolved.is_file() {
            return Err(BridgeError::Validation(format!(
                "Source file {} is not a managed upload",
                path.display()
            )));
        }
        Ok(resolved)
    }

    /// Best-effort removal of a managed artifact; failures are only logged.
    pub fn remove_artifact(&self, path: &Path) {
        if let Err(e) = std::fs::remove_file(path) {
            if e.kind() != ErrorKind::NotFound {
                warn!("Failed to clean up {}: {}", path.display(), e);
            }
        } else {
            debug!("Removed {}", path.display());
        }
    }
}

/// Keeps `[A-Za-z0-9._-]` of the final path component and maps the rest to `_`.
pub fn sanitize_file_name(original: &str) -> String {
    let base = original
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or("")
        .trim();
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' })
        .collect();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        DEFAULT_UPLOAD_NAME.to_string()
    } else {
        cleaned
    }
}

fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => other.to_string(),
    }
}
