use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::db::RecordWriter;
use crate::replay::ReplayDecoder;
use crate::s3::Storage;
use crate::sync::error::SyncError;
use crate::sync::storage::ProcessedStore;
use crate::sync::synchronizer::{CycleReport, Synchronizer};

/// Drives the synchronizer at a fixed cadence until cancelled
pub struct Scheduler<St, D, W, P>
where
    St: Storage,
    D: ReplayDecoder,
    W: RecordWriter,
    P: ProcessedStore,
{
    synchronizer: Synchronizer<St, D, W, P>,
    interval: Duration,
}

impl<St, D, W, P> Scheduler<St, D, W, P>
where
    St: Storage,
    D: ReplayDecoder,
    W: RecordWriter,
    P: ProcessedStore,
{
    pub fn new(synchronizer: Synchronizer<St, D, W, P>, interval: Duration) -> Self {
        Self {
            synchronizer,
            interval,
        }
    }

    /// Run a single cycle
    pub async fn run_once(&self, ct: &CancellationToken) -> Result<CycleReport, SyncError> {
        self.synchronizer.run_cycle(ct).await
    }

    /// Poll until `ct` is cancelled or a cycle hits corrupt state.
    ///
    /// The first cycle starts immediately. A cycle that overruns the interval
    /// delays the next tick instead of triggering a burst of catch-up cycles.
    pub async fn run(&self, ct: CancellationToken) -> Result<(), SyncError> {
        info!("Polling for new replays every {:?}", self.interval);

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cycle: u64 = 0;

        loop {
            tokio::select! {
                biased;
                _ = ct.cancelled() => break,
                _ = ticker.tick() => {}
            }

            cycle += 1;
            match self.synchronizer.run_cycle(&ct).await {
                Ok(report) if report.candidates > 0 || report.quarantined > 0 => {
                    info!(
                        "Cycle {}: {} listed, {} candidates, {} ingested, {} failed",
                        cycle, report.listed, report.candidates, report.succeeded, report.failed
                    );
                }
                Ok(_) => {}
                Err(e) if e.is_fatal() => {
                    error!("Cycle {} hit unrecoverable state, stopping: {}", cycle, e);
                    return Err(e);
                }
                Err(e) => {
                    error!("Cycle {} failed, retrying next tick: {}", cycle, e);
                }
            }

            if ct.is_cancelled() {
                break;
            }
        }

        info!("Shutdown requested, scheduler stopped after {} cycles", cycle);
        Ok(())
    }
}
