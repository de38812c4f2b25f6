use crate::sync::storage::error::StateError;
use crate::sync::storage::processed_store::{FailureLedger, ProcessedStore};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, ErrorCode};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::task;
use tracing::{debug, error, info};

/// Processed-set store backed by a SQLite database.
///
/// Every `save` replaces the table contents inside a single transaction, which
/// gives the same all-or-nothing guarantee as the JSON store's rename.
pub struct SqliteProcessedStore {
    connection: Arc<Mutex<Connection>>,
    location: String,
}

fn sqlite_error(location: &str, e: rusqlite::Error) -> StateError {
    match &e {
        rusqlite::Error::SqliteFailure(failure, _)
            if matches!(
                failure.code,
                ErrorCode::NotADatabase | ErrorCode::DatabaseCorrupt
            ) =>
        {
            StateError::Corrupt(location.to_string(), e.to_string())
        }
        _ => StateError::OperationError(format!("{location}: {e}")),
    }
}

impl SqliteProcessedStore {
    /// Open (or create) the state database at `db_path`. `:memory:` is accepted.
    pub fn new(db_path: &str) -> Result<Self, StateError> {
        info!("Opening SQLite processed-set state at {db_path}");

        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                debug!("Creating parent directory: {:?}", parent);
                fs::create_dir_all(parent).map_err(|e| {
                    error!("Failed to create directory {parent:?}: {e}");
                    StateError::OpenError(format!("Failed to create directory: {e}"))
                })?;
            }
        }

        let connection = Connection::open(db_path).map_err(|e| {
            error!("Failed to open SQLite database at {db_path}: {e}");
            StateError::OpenError(format!("Failed to open SQLite database: {e}"))
        })?;

        connection
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS processed_keys (
                    key TEXT PRIMARY KEY,
                    processed_at TEXT NOT NULL
                );
                CREATE TABLE IF NOT EXISTS decode_failures (
                    key TEXT PRIMARY KEY,
                    attempts INTEGER NOT NULL
                );",
            )
            .map_err(|e| {
                error!("Failed to initialize state schema: {e}");
                sqlite_error(db_path, e)
            })?;

        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
            location: db_path.to_string(),
        })
    }

    async fn with_connection<T, F>(&self, f: F) -> Result<T, StateError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection, &str) -> Result<T, StateError> + Send + 'static,
    {
        let connection = Arc::clone(&self.connection);
        let location = self.location.clone();

        task::spawn_blocking(move || {
            let mut conn = connection.lock().map_err(|_| {
                error!("Failed to acquire state database lock");
                StateError::OperationError("state database lock poisoned".to_string())
            })?;
            f(&mut conn, &location)
        })
        .await
        .map_err(|e| {
            error!("Task panic in state storage: {e}");
            StateError::OperationError(format!("Task panic: {e}"))
        })?
    }
}

#[async_trait]
impl ProcessedStore for SqliteProcessedStore {
    async fn load(&self) -> Result<HashSet<String>, StateError> {
        self.with_connection(|conn, location| {
            let mut statement = conn
                .prepare("SELECT key FROM processed_keys")
                .map_err(|e| sqlite_error(location, e))?;
            let keys = statement
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(|e| sqlite_error(location, e))?
                .collect::<Result<HashSet<String>, _>>()
                .map_err(|e| sqlite_error(location, e))?;
            Ok(keys)
        })
        .await
    }

    async fn save(&self, processed: &HashSet<String>) -> Result<(), StateError> {
        let keys: Vec<String> = processed.iter().cloned().collect();
        let now = Utc::now().to_rfc3339();

        self.with_connection(move |conn, location| {
            let tx = conn.transaction().map_err(|e| sqlite_error(location, e))?;
            {
                // Keep processed_at of keys that were already present
                tx.execute(
                    "CREATE TEMP TABLE IF NOT EXISTS incoming_keys (key TEXT PRIMARY KEY)",
                    [],
                )
                .map_err(|e| sqlite_error(location, e))?;
                tx.execute("DELETE FROM incoming_keys", [])
                    .map_err(|e| sqlite_error(location, e))?;

                let mut stage = tx
                    .prepare("INSERT OR IGNORE INTO incoming_keys (key) VALUES (?1)")
                    .map_err(|e| sqlite_error(location, e))?;
                let mut insert = tx
                    .prepare(
                        "INSERT OR IGNORE INTO processed_keys (key, processed_at) VALUES (?1, ?2)",
                    )
                    .map_err(|e| sqlite_error(location, e))?;
                for key in &keys {
                    stage
                        .execute(params![key])
                        .map_err(|e| sqlite_error(location, e))?;
                    insert
                        .execute(params![key, now])
                        .map_err(|e| sqlite_error(location, e))?;
                }

                tx.execute(
                    "DELETE FROM processed_keys WHERE key NOT IN (SELECT key FROM incoming_keys)",
                    [],
                )
                .map_err(|e| sqlite_error(location, e))?;
            }
            tx.commit().map_err(|e| sqlite_error(location, e))?;

            debug!("Saved {} processed keys", keys.len());
            Ok(())
        })
        .await
    }

    async fn load_failures(&self) -> Result<FailureLedger, StateError> {
        self.with_connection(|conn, location| {
            let mut statement = conn
                .prepare("SELECT key, attempts FROM decode_failures")
                .map_err(|e| sqlite_error(location, e))?;
            let ledger = statement
                .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, u32>(1)?)))
                .map_err(|e| sqlite_error(location, e))?
                .collect::<Result<FailureLedger, _>>()
                .map_err(|e| sqlite_error(location, e))?;
            Ok(ledger)
        })
        .await
    }

    async fn save_failures(&self, failures: &FailureLedger) -> Result<(), StateError> {
        let failures = failures.clone();

        self.with_connection(move |conn, location| {
            let tx = conn.transaction().map_err(|e| sqlite_error(location, e))?;
            tx.execute("DELETE FROM decode_failures", [])
                .map_err(|e| sqlite_error(location, e))?;
            {
                let mut insert = tx
                    .prepare("INSERT INTO decode_failures (key, attempts) VALUES (?1, ?2)")
                    .map_err(|e| sqlite_error(location, e))?;
                for (key, attempts) in &failures {
                    insert
                        .execute(params![key, attempts])
                        .map_err(|e| sqlite_error(location, e))?;
                }
            }
            tx.commit().map_err(|e| sqlite_error(location, e))
        })
        .await
    }

    async fn clear(&self) -> Result<(), StateError> {
        self.with_connection(|conn, location| {
            conn.execute_batch("DELETE FROM processed_keys; DELETE FROM decode_failures;")
                .map_err(|e| sqlite_error(location, e))
        })
        .await?;
        info!("Cleared processed-set state at {}", self.location);
        Ok(())
    }
}
