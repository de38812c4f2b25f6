pub mod error;
#[cfg(test)]
pub mod fake;
pub mod models;
pub mod postgres;
pub mod writer;

pub use error::PersistError;
#[cfg(test)]
pub use fake::FakeWriter;
pub use models::{MatchRecord, PlayerStatRecord, Row, Value};
pub use postgres::PostgresWriter;
pub use writer::RecordWriter;

/// Whether `name` is a bare SQL identifier that can be spliced into a statement
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    name.len() <= 63 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
