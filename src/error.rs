use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Remote error: {0}")]
    Remote(String),

    #[error("Format error: {0}")]
    Format(String),

    #[error("Unsupported transfer direction: {source_kind} -> {destination_kind}")]
    UnsupportedDirection {
        source_kind: String,
        destination_kind: String,
    },

    /// A transfer that stopped after some rows were already confirmed at the destination.
    #[error("Transfer to {destination} stopped after {records_processed} records: {cause}")]
    PartialTransfer {
        records_processed: u64,
        destination: String,
        cause: Box<BridgeError>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl BridgeError {
    /// HTTP status the API layer reports for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            BridgeError::Validation(_)
            | BridgeError::Connection(_)
            | BridgeError::Format(_)
            | BridgeError::UnsupportedDirection { .. } => 400,
            BridgeError::Remote(_)
            | BridgeError::PartialTransfer { .. }
            | BridgeError::Io(_)
            | BridgeError::Json(_)
            | BridgeError::Csv(_) => 500,
        }
    }

    /// Rows confirmed at the destination before the failure, if any were.
    pub fn records_processed(&self) -> Option<u64> {
        match self {
            BridgeError::PartialTransfer { records_processed, .. } => Some(*records_processed),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
