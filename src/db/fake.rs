use crate::db::error::PersistError;
use crate::db::models::{Row, Value};
use crate::db::writer::RecordWriter;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

/// In-memory record writer for tests. Rows are kept per table in insert order.
#[derive(Clone, Default)]
pub struct FakeWriter {
    tables: Arc<RwLock<HashMap<String, Vec<Row>>>>,
    fail_tables: Arc<RwLock<HashSet<String>>>,
    fail_players: Arc<RwLock<HashSet<String>>>,
}

impl FakeWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every insert into `table`
    pub fn fake_fail_table(&self, table: &str) {
        self.fail_tables.write().unwrap().insert(table.to_string());
    }

    pub fn fake_reset_table(&self, table: &str) {
        self.fail_tables.write().unwrap().remove(table);
    }

    /// Reject inserts whose `player_name` column equals `name`
    pub fn fake_fail_player(&self, name: &str) {
        self.fail_players.write().unwrap().insert(name.to_string());
    }

    pub fn fake_reset_player(&self, name: &str) {
        self.fail_players.write().unwrap().remove(name);
    }

    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.tables
            .read()
            .unwrap()
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.tables
            .read()
            .unwrap()
            .get(table)
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn total_rows(&self) -> usize {
        self.tables.read().unwrap().values().map(Vec::len).sum()
    }
}

#[async_trait]
impl RecordWriter for FakeWriter {
    async fn insert(&self, table: &str, row: Row) -> Result<(), PersistError> {
        if self.fail_tables.read().unwrap().contains(table) {
            return Err(PersistError::InsertError(
                table.to_string(),
                "simulated insert failure".to_string(),
            ));
        }

        if let Some(Value::Text(name)) = row.get("player_name") {
            if self.fail_players.read().unwrap().contains(name) {
                return Err(PersistError::InsertError(
                    table.to_string(),
                    format!("simulated failure for player {name}"),
                ));
            }
        }

        self.tables
            .write()
            .unwrap()
            .entry(table.to_string())
            .or_default()
            .push(row);
        Ok(())
    }
}
