use std::time::Duration;
use thiserror::Error;

/// Errors raised while turning a staged replay file into a match description
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Failed to read replay file {0}: {1}")]
    Io(String, String),

    #[error("Malformed replay: {0}")]
    Malformed(String),

    #[error("Replay header is missing the {0} property")]
    MissingProperty(&'static str),

    #[error("Decoding timed out after {0:?}")]
    Timeout(Duration),

    #[error("Decoder task failed: {0}")]
    TaskFailed(String),
}
