use crate::replay::error::DecodeError;
use crate::replay::models::MatchDescription;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

/// Decoder trait turning a local replay file into a match description
#[async_trait]
pub trait ReplayDecoder: Send + Sync + 'static {
    /// Parse the replay at `path`
    async fn decode(&self, path: &Path) -> Result<MatchDescription, DecodeError>;
}

#[async_trait]
impl<T: ReplayDecoder + ?Sized> ReplayDecoder for Arc<T> {
    async fn decode(&self, path: &Path) -> Result<MatchDescription, DecodeError> {
        (**self).decode(path).await
    }
}
