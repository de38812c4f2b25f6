use std::time::Duration;
use thiserror::Error;

/// Errors raised by the record writer
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("Failed to connect to database: {0}")]
    ConnectionError(String),

    #[error("Insert into {0} failed: {1}")]
    InsertError(String, String),

    #[error("Invalid SQL identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("Row for {0} has no columns")]
    EmptyRow(String),

    #[error("Insert into {0} timed out after {1:?}")]
    Timeout(String, Duration),
}
