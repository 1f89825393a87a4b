//! Identifier guard for names interpolated into store queries.

use crate::error::{BridgeError, Result};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref IDENTIFIER: Regex = Regex::new(r"^[A-Za-z0-9_]+$").unwrap();
}

/// Accepts only ASCII letters, digits and underscores.
pub fn validate_identifier(name: &str) -> Result<&str> {
    if IDENTIFIER.is_match(name) {
        Ok(name)
    } else {
        Err(BridgeError::Validation(format!(
            "Invalid identifier '{}': only letters, digits and '_' are allowed",
            name
        )))
    }
}

/// `table` or `database.table`, each part a valid identifier.
pub fn validate_table_name(name: &str) -> Result<&str> {
    if name.trim().is_empty() {
        return Err(BridgeError::Validation("Table name is required".to_string()));
    }
    let parts: Vec<&str> = name.split('.').collect();
    if parts.len() > 2 {
        return Err(BridgeError::Validation(format!("Invalid table name '{}'", name)));
    }
    for part in parts {
        validate_identifier(part)?;
    }
    Ok(name)
}

/// Back-quotes a validated identifier or dotted table name.
pub fn quote(name: &str) -> String {
    name.split('.').map(|p| format!("`{}`", p)).collect::<Vec<_>>().join(".")
}
