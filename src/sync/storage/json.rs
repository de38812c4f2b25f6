use crate::sync::storage::error::StateError;
use crate::sync::storage::processed_store::{FailureLedger, ProcessedStore};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::task;
use tracing::{debug, info};

/// Processed-set store backed by a JSON document on local disk.
///
/// The processed set is a JSON array of keys. Decode-failure counts live in a
/// sibling `<stem>.failures.json` object so the processed file keeps its
/// plain list-of-strings layout.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    failures_path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let failures_path = path.with_extension("failures.json");
        info!("Using JSON processed-set state at {}", path.display());
        Self {
            path,
            failures_path,
        }
    }

    #[cfg(test)]
    pub fn failures_path(&self) -> &Path {
        &self.failures_path
    }
}

fn read_document<T>(path: &Path) -> Result<T, StateError>
where
    T: DeserializeOwned + Default,
{
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("No state at {}, starting empty", path.display());
            return Ok(T::default());
        }
        Err(e) => {
            return Err(StateError::Corrupt(
                path.display().to_string(),
                e.to_string(),
            ))
        }
    };

    serde_json::from_slice(&bytes)
        .map_err(|e| StateError::Corrupt(path.display().to_string(), e.to_string()))
}

/// Write `value` next to `path` and rename it into place, so a crash leaves
/// either the previous document or the new one, never a torn write.
fn write_document<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StateError> {
    let write_error = |e: &dyn std::fmt::Display| {
        StateError::WriteError(path.display().to_string(), e.to_string())
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).map_err(|e| write_error(&e))?;

    let bytes = serde_json::to_vec_pretty(value).map_err(|e| write_error(&e))?;

    let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| write_error(&e))?;
    tmp.write_all(&bytes).map_err(|e| write_error(&e))?;
    tmp.as_file().sync_all().map_err(|e| write_error(&e))?;
    tmp.persist(path).map_err(|e| write_error(&e.error))?;

    sync_dir(&dir);
    Ok(())
}

/// Make a completed rename durable
#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Ok(dir) = fs::File::open(dir) {
        let _ = dir.sync_all();
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}

fn remove_if_exists(path: &Path) -> Result<(), StateError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StateError::WriteError(
            path.display().to_string(),
            e.to_string(),
        )),
    }
}

async fn blocking<T, F>(f: F) -> Result<T, StateError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, StateError> + Send + 'static,
{
    task::spawn_blocking(f)
        .await
        .map_err(|e| StateError::OperationError(format!("state task failed: {e}")))?
}

#[async_trait]
impl ProcessedStore for JsonFileStore {
    async fn load(&self) -> Result<HashSet<String>, StateError> {
        let path = self.path.clone();
        let keys: Vec<String> = blocking(move || read_document(&path)).await?;
        Ok(keys.into_iter().collect())
    }

    async fn save(&self, processed: &HashSet<String>) -> Result<(), StateError> {
        let path = self.path.clone();
        let mut keys: Vec<String> = processed.iter().cloned().collect();
        keys.sort();
        blocking(move || write_document(&path, &keys)).await?;
        debug!("Saved {} processed keys", processed.len());
        Ok(())
    }

    async fn load_failures(&self) -> Result<FailureLedger, StateError> {
        let path = self.failures_path.clone();
        blocking(move || read_document(&path)).await
    }

    async fn save_failures(&self, failures: &FailureLedger) -> Result<(), StateError> {
        let path = self.failures_path.clone();
        let failures = failures.clone();
        blocking(move || write_document(&path, &failures)).await
    }

    async fn clear(&self) -> Result<(), StateError> {
        let path = self.path.clone();
        let failures_path = self.failures_path.clone();
        blocking(move || {
            remove_if_exists(&path)?;
            remove_if_exists(&failures_path)
        })
        .await?;
        info!("Cleared processed-set state at {}", self.path.display());
        Ok(())
    }
}
