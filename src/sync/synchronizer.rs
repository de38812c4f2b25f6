use futures::{stream, StreamExt};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::pin::pin;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::IngestConfig;
use crate::db::{MatchRecord, PersistError, PlayerStatRecord, RecordWriter, Row};
use crate::replay::{DecodeError, MatchDescription, ReplayDecoder};
use crate::s3::{BucketObject, Storage, StorageError};
use crate::sync::error::{ItemError, SyncError};
use crate::sync::staging;
use crate::sync::storage::{FailureLedger, ProcessedStore};

/// Counters for one poll cycle
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Objects returned by the bucket listing
    pub listed: usize,
    /// Eligible, unprocessed, non-quarantined objects
    pub candidates: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Skipped because they keep failing to decode
    pub quarantined: usize,
    /// Candidates never started because of shutdown or a state error
    pub not_started: usize,
}

enum Outcome {
    Ingested,
    Failed,
    NotStarted,
}

/// In-cycle view of the durable state. Each lock is held across the
/// matching `save`, so saves never interleave.
struct CycleState {
    processed: Mutex<HashSet<String>>,
    failures: Mutex<FailureLedger>,
}

/// The ingestion loop: one `run_cycle` call lists the bucket and ingests every
/// replay that has not been ingested yet.
pub struct Synchronizer<St, D, W, P>
where
    St: Storage,
    D: ReplayDecoder,
    W: RecordWriter,
    P: ProcessedStore,
{
    storage: Arc<St>,
    decoder: Arc<D>,
    writer: Arc<W>,
    state: Arc<P>,
    config: IngestConfig,
}

impl<St, D, W, P> Synchronizer<St, D, W, P>
where
    St: Storage,
    D: ReplayDecoder,
    W: RecordWriter,
    P: ProcessedStore,
{
    pub fn new(storage: St, decoder: D, writer: W, state: P, config: IngestConfig) -> Self {
        Synchronizer {
            storage: Arc::new(storage),
            decoder: Arc::new(decoder),
            writer: Arc::new(writer),
            state: Arc::new(state),
            config,
        }
    }

    fn is_quarantined(&self, failures: &FailureLedger, key: &str) -> bool {
        match self.config.quarantine_after {
            Some(limit) => failures.get(key).is_some_and(|attempts| *attempts >= limit),
            None => false,
        }
    }

    /// Run one poll cycle.
    ///
    /// Per-item failures are logged and counted, never returned. The cycle only
    /// fails when the bucket cannot be listed or the processed set cannot be
    /// read or written. Cancellation stops new items from starting; items that
    /// have started always run to completion.
    pub async fn run_cycle(&self, ct: &CancellationToken) -> Result<CycleReport, SyncError> {
        let processed = self.state.load().await?;
        let mut failures = self.state.load_failures().await?;
        let listing = self
            .storage
            .list_objects()
            .await
            .map_err(SyncError::Listing)?;

        let mut report = CycleReport {
            listed: listing.len(),
            ..CycleReport::default()
        };

        // Only keys that are still listed and not yet ingested keep a failure count
        let before = failures.len();
        {
            let listed: HashSet<&str> = listing.iter().map(|object| object.key.as_str()).collect();
            failures.retain(|key, _| listed.contains(key.as_str()) && !processed.contains(key));
        }
        if failures.len() != before {
            debug!("Pruned {} stale failure counts", before - failures.len());
            self.state.save_failures(&failures).await?;
        }

        let mut candidates: Vec<BucketObject> = Vec::new();
        for object in listing {
            if !object.has_suffix(&self.config.replay_suffix) || processed.contains(&object.key) {
                continue;
            }
            if self.is_quarantined(&failures, &object.key) {
                warn!(
                    "Skipping quarantined replay {} after {} failed decodes",
                    object.key,
                    failures.get(&object.key).copied().unwrap_or_default()
                );
                report.quarantined += 1;
                continue;
            }
            candidates.push(object);
        }
        report.candidates = candidates.len();

        if candidates.is_empty() {
            debug!(
                "No new replays ({} objects listed, {} already processed)",
                report.listed,
                processed.len()
            );
            return Ok(report);
        }

        info!("Found {} new replays to ingest", candidates.len());

        let cycle_state = CycleState {
            processed: Mutex::new(processed),
            failures: Mutex::new(failures),
        };
        let halted = CancellationToken::new();

        let outcomes = stream::iter(candidates)
            .map(|object| {
                let cycle_state = &cycle_state;
                let halted = &halted;
                async move {
                    if ct.is_cancelled() || halted.is_cancelled() {
                        return Ok(Outcome::NotStarted);
                    }
                    let outcome = self.process_object(&object, cycle_state).await;
                    if outcome.is_err() {
                        halted.cancel();
                    }
                    outcome
                }
            })
            .buffer_unordered(self.config.workers.max(1));
        let mut outcomes = pin!(outcomes);

        let mut first_error: Option<SyncError> = None;
        while let Some(outcome) = outcomes.next().await {
            match outcome {
                Ok(Outcome::Ingested) => report.succeeded += 1,
                Ok(Outcome::Failed) => report.failed += 1,
                Ok(Outcome::NotStarted) => report.not_started += 1,
                Err(e) => {
                    error!("State error, no further replays will be started: {}", e);
                    report.failed += 1;
                    first_error.get_or_insert(e);
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        info!(
            "Cycle complete: {} ingested, {} failed, {} quarantined, {} not started",
            report.succeeded, report.failed, report.quarantined, report.not_started
        );
        Ok(report)
    }

    async fn process_object(
        &self,
        object: &BucketObject,
        cycle_state: &CycleState,
    ) -> Result<Outcome, SyncError> {
        let key = object.key.as_str();
        debug!("Processing {} ({} bytes)", key, object.size);

        match self.ingest(key).await {
            Ok(players) => {
                self.commit(key, cycle_state).await?;
                info!("Ingested {} ({} players)", key, players);
                Ok(Outcome::Ingested)
            }
            Err(e) => {
                warn!(
                    "Failed to ingest {} ({} error), will retry next cycle: {}",
                    e.key(),
                    e.kind(),
                    e
                );
                if matches!(e, ItemError::Decode { .. }) {
                    self.record_decode_failure(key, cycle_state).await?;
                }
                Ok(Outcome::Failed)
            }
        }
    }

    /// Fetch, decode and persist one object. Returns the number of player rows written.
    async fn ingest(&self, key: &str) -> Result<usize, ItemError> {
        let staged = self.fetch(key).await?;
        let result = self.decode_and_persist(key, &staged).await;
        if !self.config.keep_staged_files {
            staging::discard(&staged).await;
        }
        result
    }

    async fn fetch(&self, key: &str) -> Result<PathBuf, ItemError> {
        let fetch_timeout = self.config.fetch_timeout();
        let fetch_error = |source: StorageError| ItemError::Fetch {
            key: key.to_string(),
            source,
        };

        let data = match timeout(fetch_timeout, self.storage.get_object(key)).await {
            Ok(result) => result.map_err(fetch_error)?,
            Err(_) => {
                let source = StorageError::Timeout(key.to_string(), fetch_timeout);
                return Err(fetch_error(source));
            }
        };

        staging::stage(&self.config.staging_dir, key, &data)
            .await
            .map_err(fetch_error)
    }

    async fn decode(&self, key: &str, path: &Path) -> Result<MatchDescription, ItemError> {
        let decode_timeout = self.config.decode_timeout();
        let result = match timeout(decode_timeout, self.decoder.decode(path)).await {
            Ok(result) => result,
            Err(_) => Err(DecodeError::Timeout(decode_timeout)),
        };
        result.map_err(|source| ItemError::Decode {
            key: key.to_string(),
            source,
        })
    }

    async fn insert(&self, key: &str, table: &str, row: Row) -> Result<(), ItemError> {
        let persist_timeout = self.config.persist_timeout();
        let result = match timeout(persist_timeout, self.writer.insert(table, row)).await {
            Ok(result) => result,
            Err(_) => Err(PersistError::Timeout(table.to_string(), persist_timeout)),
        };
        result.map_err(|source| ItemError::Persist {
            key: key.to_string(),
            table: table.to_string(),
            source,
        })
    }

    /// The match row goes first; player rows are only attempted once it exists.
    /// A player failure leaves the match row (and earlier players) in place.
    async fn decode_and_persist(&self, key: &str, staged: &Path) -> Result<usize, ItemError> {
        let description = self.decode(key, staged).await?;

        let match_record = MatchRecord::new(key, &description);
        self.insert(key, &self.config.matches_table, match_record.to_row())
            .await?;
        debug!("Inserted match {} for {}", match_record.id, key);

        for player in &description.players {
            let record = PlayerStatRecord::new(match_record.id, player);
            self.insert(key, &self.config.player_stats_table, record.to_row())
                .await?;
        }

        Ok(description.players.len())
    }

    /// Add `key` to the processed set and persist it before anything else can
    /// be committed.
    async fn commit(&self, key: &str, cycle_state: &CycleState) -> Result<(), SyncError> {
        {
            let mut processed = cycle_state.processed.lock().await;
            processed.insert(key.to_string());
            if let Err(e) = self.state.save(&processed).await {
                processed.remove(key);
                error!("Failed to record {} as processed: {}", key, e);
                return Err(e.into());
            }
        }

        // The key is durably processed at this point; a stale count is pruned next cycle
        let mut failures = cycle_state.failures.lock().await;
        if failures.remove(key).is_some() {
            if let Err(e) = self.state.save_failures(&failures).await {
                warn!("Failed to clear failure count for {}: {}", key, e);
            }
        }
        Ok(())
    }

    async fn record_decode_failure(
        &self,
        key: &str,
        cycle_state: &CycleState,
    ) -> Result<(), SyncError> {
        let Some(limit) = self.config.quarantine_after else {
            return Ok(());
        };

        let mut failures = cycle_state.failures.lock().await;
        let attempts = {
            let entry = failures.entry(key.to_string()).or_insert(0);
            *entry += 1;
            *entry
        };
        self.state.save_failures(&failures).await?;

        if attempts >= limit {
            warn!(
                "Quarantining {} after {} consecutive decode failures",
                key, attempts
            );
        }
        Ok(())
    }
}
