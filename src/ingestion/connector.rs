//! Store Connector Traits - abstract interface for the tabular store

use crate::error::Result;
use crate::model::{ColumnDescriptor, Row, StoreConfig};
use async_trait::async_trait;

/// An open session against a tabular store.
///
/// Implementations:
/// - ClickHouseStore: ClickHouse over its HTTP interface
#[async_trait]
pub trait TabularStore: Send + Sync {
    /// Names of the tables visible to the session
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Columns of `table`, with type labels
    async fn describe_table(&self, table: &str) -> Result<Vec<ColumnDescriptor>>;

    /// Projected read; `limit` of None scans the whole table
    async fn select_rows(&self, table: &str, columns: &[String], limit: Option<u64>) -> Result<Vec<Row>>;

    /// Create `table` with every column typed as text unless it already exists
    async fn ensure_table(&self, table: &str, columns: &[String]) -> Result<()>;

    /// Append `rows` to `table` in one remote call
    async fn insert_batch(&self, table: &str, rows: &[Row]) -> Result<()>;
}

/// Opens store sessions from per-request credentials.
pub trait StoreConnector: Send + Sync {
    fn open(&self, config: &StoreConfig) -> Result<Box<dyn TabularStore>>;
}
