use crate::sync::storage::error::StateError;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Consecutive decode failures per object key
pub type FailureLedger = BTreeMap<String, u32>;

/// Durable record of which object keys have been fully ingested.
///
/// `save` replaces the stored set wholesale and must leave either the old or
/// the new state readable if the process dies part-way through.
#[async_trait]
pub trait ProcessedStore: Send + Sync + 'static {
    /// Keys known to be fully processed. Empty when no state exists yet.
    async fn load(&self) -> Result<HashSet<String>, StateError>;

    /// Durably overwrite the processed set
    async fn save(&self, processed: &HashSet<String>) -> Result<(), StateError>;

    /// Decode-failure counts, kept apart from the processed set
    async fn load_failures(&self) -> Result<FailureLedger, StateError>;

    /// Durably overwrite the failure ledger
    async fn save_failures(&self, failures: &FailureLedger) -> Result<(), StateError>;

    /// Forget everything: processed keys and failure counts
    async fn clear(&self) -> Result<(), StateError>;
}

#[async_trait]
impl<T: ProcessedStore + ?Sized> ProcessedStore for Arc<T> {
    async fn load(&self) -> Result<HashSet<String>, StateError> {
        (**self).load().await
    }

    async fn save(&self, processed: &HashSet<String>) -> Result<(), StateError> {
        (**self).save(processed).await
    }

    async fn load_failures(&self) -> Result<FailureLedger, StateError> {
        (**self).load_failures().await
    }

    async fn save_failures(&self, failures: &FailureLedger) -> Result<(), StateError> {
        (**self).save_failures(failures).await
    }

    async fn clear(&self) -> Result<(), StateError> {
        (**self).clear().await
    }
}

#[async_trait]
impl<T: ProcessedStore + ?Sized> ProcessedStore for Box<T> {
    async fn load(&self) -> Result<HashSet<String>, StateError> {
        (**self).load().await
    }

    async fn save(&self, processed: &HashSet<String>) -> Result<(), StateError> {
        (**self).save(processed).await
    }

    async fn load_failures(&self) -> Result<FailureLedger, StateError> {
        (**self).load_failures().await
    }

    async fn save_failures(&self, failures: &FailureLedger) -> Result<(), StateError> {
        (**self).save_failures(failures).await
    }

    async fn clear(&self) -> Result<(), StateError> {
        (**self).clear().await
    }
}
