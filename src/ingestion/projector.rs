//! Column Projector - restricts a row to the selected columns

use crate::model::Row;
use serde_json::Value;

/// Returns a row holding exactly `columns`, in that order.
///
/// Columns missing from `row` come back as `null` so heterogeneous rows never
/// stop a transfer mid-stream.
pub fn project(row: &Row, columns: &[String]) -> Row {
    columns
        .iter()
        .map(|col| (col.clone(), row.get(col).cloned().unwrap_or(Value::Null)))
        .collect()
}

/// Projects every row, consuming the input.
pub fn project_all(rows: Vec<Row>, columns: &[String]) -> Vec<Row> {
    rows.into_iter().map(|row| project(&row, columns)).collect()
}
