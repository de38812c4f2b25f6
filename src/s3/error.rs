use std::time::Duration;
use thiserror::Error;

/// Errors raised while listing or fetching bucket objects
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Object with key {0} not found")]
    ObjectNotFound(String),

    #[error("Access denied for object {0}: {1}")]
    AccessDenied(String, String),

    #[error("Failed to read object {0}: {1}")]
    ReadError(String, String),

    #[error("Failed to list bucket {0}: {1}")]
    ListError(String, String),

    #[error("Failed to stage object {0} locally: {1}")]
    StagingError(String, String),

    #[error("Fetching object {0} timed out after {1:?}")]
    Timeout(String, Duration),

    #[error("Other storage error: {0}")]
    Other(#[from] anyhow::Error),
}
