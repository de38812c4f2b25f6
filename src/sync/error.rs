use crate::db::PersistError;
use crate::replay::DecodeError;
use crate::s3::StorageError;
use crate::sync::storage::StateError;
use thiserror::Error;

/// Failure of a single candidate object. Never aborts a cycle.
#[derive(Error, Debug)]
pub enum ItemError {
    #[error("fetch failed for {key}: {source}")]
    Fetch { key: String, source: StorageError },

    #[error("decode failed for {key}: {source}")]
    Decode { key: String, source: DecodeError },

    #[error("insert into {table} failed for {key}: {source}")]
    Persist {
        key: String,
        table: String,
        source: PersistError,
    },
}

impl ItemError {
    pub fn key(&self) -> &str {
        match self {
            ItemError::Fetch { key, .. }
            | ItemError::Decode { key, .. }
            | ItemError::Persist { key, .. } => key,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ItemError::Fetch { .. } => "fetch",
            ItemError::Decode { .. } => "decode",
            ItemError::Persist { .. } => "persist",
        }
    }
}

/// Failure of a whole poll cycle
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("processed-set state error: {0}")]
    State(#[from] StateError),

    #[error("failed to list bucket: {0}")]
    Listing(#[source] StorageError),
}

impl SyncError {
    /// Fatal errors stop the scheduler; continuing could re-ingest or lose keys
    pub fn is_fatal(&self) -> bool {
        matches!(self, SyncError::State(e) if e.is_corrupt())
    }
}
