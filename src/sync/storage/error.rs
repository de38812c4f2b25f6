use thiserror::Error;

/// Errors raised by the processed-set store
#[derive(Error, Debug)]
pub enum StateError {
    /// State exists but cannot be read back. Continuing would risk
    /// re-ingesting or silently forgetting keys.
    #[error("Processed-set state at {0} is corrupt: {1}")]
    Corrupt(String, String),

    #[error("Failed to open state storage: {0}")]
    OpenError(String),

    #[error("Failed to write state to {0}: {1}")]
    WriteError(String, String),

    #[error("State operation failed: {0}")]
    OperationError(String),
}

impl StateError {
    pub fn is_corrupt(&self) -> bool {
        matches!(self, StateError::Corrupt(_, _))
    }
}
