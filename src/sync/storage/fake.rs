use crate::sync::storage::error::StateError;
use crate::sync::storage::processed_store::{FailureLedger, ProcessedStore};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

/// In-memory processed-set store for tests
#[derive(Clone, Default)]
pub struct FakeProcessedStore {
    processed: Arc<RwLock<HashSet<String>>>,
    failures: Arc<RwLock<FailureLedger>>,
    saves: Arc<AtomicUsize>,
    corrupt: Arc<AtomicBool>,
    fail_saves: Arc<AtomicBool>,
    fail_ledger_saves: Arc<AtomicBool>,
}

impl FakeProcessedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_keys(keys: &[&str]) -> Self {
        let store = Self::new();
        store
            .processed
            .write()
            .unwrap()
            .extend(keys.iter().map(|k| k.to_string()));
        store
    }

    /// Make every subsequent load report corrupt state
    pub fn fake_corrupt(&self, corrupt: bool) {
        self.corrupt.store(corrupt, Ordering::SeqCst);
    }

    /// Make every subsequent save fail
    pub fn fake_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent failure-ledger save fail, leaving `save` working
    pub fn fake_fail_ledger_saves(&self, fail: bool) {
        self.fail_ledger_saves.store(fail, Ordering::SeqCst);
    }

    /// The durably stored set, as a restarted process would see it
    pub fn snapshot(&self) -> HashSet<String> {
        self.processed.read().unwrap().clone()
    }

    pub fn failures_snapshot(&self) -> FailureLedger {
        self.failures.read().unwrap().clone()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    fn check_corrupt(&self) -> Result<(), StateError> {
        if self.corrupt.load(Ordering::SeqCst) {
            return Err(StateError::Corrupt(
                "fake".to_string(),
                "simulated corruption".to_string(),
            ));
        }
        Ok(())
    }

    fn check_save(&self) -> Result<(), StateError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StateError::WriteError(
                "fake".to_string(),
                "simulated write failure".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ProcessedStore for FakeProcessedStore {
    async fn load(&self) -> Result<HashSet<String>, StateError> {
        self.check_corrupt()?;
        Ok(self.snapshot())
    }

    async fn save(&self, processed: &HashSet<String>) -> Result<(), StateError> {
        self.check_save()?;
        *self.processed.write().unwrap() = processed.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn load_failures(&self) -> Result<FailureLedger, StateError> {
        self.check_corrupt()?;
        Ok(self.failures_snapshot())
    }

    async fn save_failures(&self, failures: &FailureLedger) -> Result<(), StateError> {
        self.check_save()?;
        if self.fail_ledger_saves.load(Ordering::SeqCst) {
            return Err(StateError::WriteError(
                "fake-ledger".to_string(),
                "simulated ledger write failure".to_string(),
            ));
        }
        *self.failures.write().unwrap() = failures.clone();
        Ok(())
    }

    async fn clear(&self) -> Result<(), StateError> {
        self.processed.write().unwrap().clear();
        self.failures.write().unwrap().clear();
        Ok(())
    }
}
