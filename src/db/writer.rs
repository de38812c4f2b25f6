use crate::db::error::PersistError;
use crate::db::models::Row;
use async_trait::async_trait;
use std::sync::Arc;

/// Writer trait inserting single rows into named destination tables
#[async_trait]
pub trait RecordWriter: Send + Sync + 'static {
    /// Insert (or upsert by `id`) one row into `table`
    async fn insert(&self, table: &str, row: Row) -> Result<(), PersistError>;
}

#[async_trait]
impl<T: RecordWriter + ?Sized> RecordWriter for Arc<T> {
    async fn insert(&self, table: &str, row: Row) -> Result<(), PersistError> {
        (**self).insert(table, row).await
    }
}
