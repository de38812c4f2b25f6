pub mod error;
#[cfg(test)]
pub mod fake;
pub mod json;
pub mod processed_store;
pub mod sqlite;

pub use error::StateError;
#[cfg(test)]
pub use fake::FakeProcessedStore;
pub use json::JsonFileStore;
pub use processed_store::{FailureLedger, ProcessedStore};
pub use sqlite::SqliteProcessedStore;
