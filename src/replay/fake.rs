use crate::replay::decoder::ReplayDecoder;
use crate::replay::error::DecodeError;
use crate::replay::models::MatchDescription;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Test decoder: a staged file decodes successfully iff it holds a JSON
/// `MatchDescription`. Anything else is a `DecodeError::Malformed`.
#[derive(Clone, Default)]
pub struct FakeDecoder {
    decoded: Arc<Mutex<Vec<PathBuf>>>,
    delay: Arc<Mutex<Option<Duration>>>,
}

impl FakeDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode a match the way this decoder expects to find it on disk
    pub fn encode(description: &MatchDescription) -> Vec<u8> {
        serde_json::to_vec(description).unwrap()
    }

    pub fn fake_set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().unwrap() = delay;
    }

    /// Paths passed to `decode`, in call order
    pub fn decoded_paths(&self) -> Vec<PathBuf> {
        self.decoded.lock().unwrap().clone()
    }

    pub fn decode_count(&self) -> usize {
        self.decoded.lock().unwrap().len()
    }
}

#[async_trait]
impl ReplayDecoder for FakeDecoder {
    async fn decode(&self, path: &Path) -> Result<MatchDescription, DecodeError> {
        self.decoded.lock().unwrap().push(path.to_path_buf());

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let data = tokio::fs::read(path)
            .await
            .map_err(|e| DecodeError::Io(path.display().to_string(), e.to_string()))?;
        serde_json::from_slice(&data).map_err(|e| DecodeError::Malformed(e.to_string()))
    }
}
