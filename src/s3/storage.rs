use crate::s3::error::StorageError;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

/// An object as reported by a bucket listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketObject {
    pub key: String,
    pub size: i64,
}

impl BucketObject {
    pub fn new(key: impl Into<String>, size: i64) -> Self {
        Self {
            key: key.into(),
            size,
        }
    }

    /// Whether the key ends with the given file suffix (e.g. `.replay`)
    pub fn has_suffix(&self, suffix: &str) -> bool {
        self.key.ends_with(suffix)
    }
}

/// Storage trait for listing and reading objects from S3-compatible storage
#[async_trait]
pub trait Storage: Send + Sync + 'static {
    /// List every object currently in the configured bucket
    async fn list_objects(&self) -> Result<Vec<BucketObject>, StorageError>;

    /// Get an object by its key
    ///
    /// * `key` - The object key to retrieve
    async fn get_object(&self, key: &str) -> Result<Bytes, StorageError>;

    /// Add an object to storage (test-only)
    #[cfg(test)]
    async fn add_object(&self, key: &str, data: Bytes) -> Result<(), StorageError>;

    /// Remove an object from storage (test-only)
    #[cfg(test)]
    async fn remove_object(&self, key: &str) -> Result<(), StorageError>;
}

#[async_trait]
impl<T: Storage + ?Sized> Storage for Arc<T> {
    async fn list_objects(&self) -> Result<Vec<BucketObject>, StorageError> {
        (**self).list_objects().await
    }

    async fn get_object(&self, key: &str) -> Result<Bytes, StorageError> {
        (**self).get_object(key).await
    }

    #[cfg(test)]
    async fn add_object(&self, key: &str, data: Bytes) -> Result<(), StorageError> {
        (**self).add_object(key, data).await
    }

    #[cfg(test)]
    async fn remove_object(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove_object(key).await
    }
}
