use crate::s3::error::StorageError;
use crate::s3::storage::{BucketObject, Storage};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// In-memory bucket for tests. Listing order is lexicographic by key.
#[derive(Clone, Default)]
pub struct FakeStorage {
    data: Arc<Mutex<BTreeMap<String, Bytes>>>,
    fail_objects: Arc<Mutex<HashSet<String>>>,
    delays: Arc<Mutex<HashMap<String, Duration>>>,
    fail_listing: Arc<Mutex<bool>>,
    fetches: Arc<Mutex<Vec<String>>>,
}

impl FakeStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a download failure for a specific object
    pub async fn fake_fail_object(&self, key: &str) {
        self.fail_objects.lock().await.insert(key.to_string());
    }

    pub async fn fake_reset_object(&self, key: &str) {
        self.fail_objects.lock().await.remove(key);
    }

    /// Make downloads of `key` stall for `delay` before answering
    pub async fn fake_delay_object(&self, key: &str, delay: Duration) {
        self.delays.lock().await.insert(key.to_string(), delay);
    }

    pub async fn fake_fail_listing(&self, fail: bool) {
        *self.fail_listing.lock().await = fail;
    }

    /// Keys passed to `get_object`, in call order
    pub async fn fetched_keys(&self) -> Vec<String> {
        self.fetches.lock().await.clone()
    }

    pub async fn fetch_count(&self, key: &str) -> usize {
        self.fetches
            .lock()
            .await
            .iter()
            .filter(|fetched| fetched.as_str() == key)
            .count()
    }
}

#[async_trait]
impl Storage for FakeStorage {
    async fn list_objects(&self) -> Result<Vec<BucketObject>, StorageError> {
        if *self.fail_listing.lock().await {
            return Err(StorageError::ListError(
                "fake-bucket".to_string(),
                "simulated listing failure".to_string(),
            ));
        }

        let data = self.data.lock().await;
        Ok(data
            .iter()
            .map(|(key, bytes)| BucketObject::new(key.clone(), bytes.len() as i64))
            .collect())
    }

    async fn get_object(&self, key: &str) -> Result<Bytes, StorageError> {
        self.fetches.lock().await.push(key.to_string());

        let delay = self.delays.lock().await.get(key).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_objects.lock().await.contains(key) {
            return Err(StorageError::ReadError(
                key.to_string(),
                "simulated read failure".to_string(),
            ));
        }

        let data = self.data.lock().await;
        match data.get(key) {
            Some(bytes) => Ok(bytes.clone()),
            None => Err(StorageError::ObjectNotFound(key.to_string())),
        }
    }

    async fn add_object(&self, key: &str, data: Bytes) -> Result<(), StorageError> {
        self.data.lock().await.insert(key.to_string(), data);
        Ok(())
    }

    async fn remove_object(&self, key: &str) -> Result<(), StorageError> {
        if self.data.lock().await.remove(key).is_some() {
            Ok(())
        } else {
            Err(StorageError::ObjectNotFound(key.to_string()))
        }
    }
}
