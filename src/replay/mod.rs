pub mod boxcars_decoder;
pub mod decoder;
pub mod error;
#[cfg(test)]
pub mod fake;
pub mod models;

pub use boxcars_decoder::BoxcarsDecoder;
pub use decoder::ReplayDecoder;
pub use error::DecodeError;
#[cfg(test)]
pub use fake::FakeDecoder;
pub use models::{MatchDescription, PlayerLine};
