use crate::config::DatabaseConfig;
use crate::db::error::PersistError;
use crate::db::is_identifier;
use crate::db::models::{Row, Value};
use crate::db::writer::RecordWriter;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{debug, error, info};

/// A PostgreSQL implementation of the RecordWriter trait.
///
/// Destination tables must already exist; this writer never creates or alters them.
pub struct PostgresWriter {
    pool: PgPool,
    schema: Option<String>,
}

impl PostgresWriter {
    pub async fn new(config: &DatabaseConfig) -> Result<Self, PersistError> {
        if let Some(schema) = &config.schema {
            if !is_identifier(schema) {
                return Err(PersistError::InvalidIdentifier(schema.clone()));
            }
        }

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(60))
            .connect_lazy(&config.url)
            .map_err(|e| {
                error!("Failed to create connection pool: {}", e);
                PersistError::ConnectionError(e.to_string())
            })?;

        if let Err(e) = sqlx::query("SELECT 1").execute(&pool).await {
            error!("Database connectivity test failed: {}", e);
            return Err(PersistError::ConnectionError(format!(
                "Database is not accessible: {}",
                e
            )));
        }

        info!("PostgreSQL connection established");
        Ok(Self {
            pool,
            schema: config.schema.clone(),
        })
    }

    fn table_name(&self, table: &str) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", schema, table),
            None => table.to_string(),
        }
    }
}

/// Render the parameterised upsert for `row`.
///
/// Rows carrying an `id` column conflict on it and overwrite the other columns;
/// rows without one are plain inserts.
pub fn build_insert(table_name: &str, row: &Row) -> Result<String, PersistError> {
    if row.is_empty() {
        return Err(PersistError::EmptyRow(table_name.to_string()));
    }
    for (column, _) in row.columns() {
        if !is_identifier(column) {
            return Err(PersistError::InvalidIdentifier(column.clone()));
        }
    }

    let columns: Vec<&str> = row.columns().iter().map(|(c, _)| c.as_str()).collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("${}", i)).collect();

    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table_name,
        columns.join(", "),
        placeholders.join(", ")
    );

    if columns.contains(&"id") {
        let updates: Vec<String> = columns
            .iter()
            .filter(|c| **c != "id")
            .map(|c| format!("{c} = EXCLUDED.{c}"))
            .collect();
        if updates.is_empty() {
            sql.push_str(" ON CONFLICT (id) DO NOTHING");
        } else {
            sql.push_str(" ON CONFLICT (id) DO UPDATE SET ");
            sql.push_str(&updates.join(", "));
        }
    }

    Ok(sql)
}

#[async_trait]
impl RecordWriter for PostgresWriter {
    async fn insert(&self, table: &str, row: Row) -> Result<(), PersistError> {
        if !is_identifier(table) {
            return Err(PersistError::InvalidIdentifier(table.to_string()));
        }
        let table_name = self.table_name(table);
        let sql = build_insert(&table_name, &row)?;
        debug!("Executing: {}", sql);

        let mut query = sqlx::query(&sql);
        for (_, value) in row.columns() {
            query = match value {
                Value::Uuid(v) => query.bind(*v),
                Value::Text(v) => query.bind(v.as_str()),
                Value::Int(v) => query.bind(*v),
            };
        }

        query.execute(&self.pool).await.map_err(|e| {
            error!("Insert into {} failed: {}", table_name, e);
            PersistError::InsertError(table_name.clone(), e.to_string())
        })?;

        Ok(())
    }
}
