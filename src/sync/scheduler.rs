//! Recurring pass trigger.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use super::engine::{PassOutcome, SyncEngine};

/// Counts of how scheduled passes ended.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerStats {
    pub completed: usize,
    pub no_data: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl SchedulerStats {
    pub fn passes(&self) -> usize {
        self.completed + self.no_data + self.skipped + self.failed
    }
}

/// Runs one pass immediately, then one per interval until shutdown.
pub struct Scheduler {
    engine: Arc<SyncEngine>,
    interval: Duration,
}

impl Scheduler {
    pub fn new(engine: Arc<SyncEngine>, interval: Duration) -> Self {
        Self { engine, interval }
    }

    /// Trigger passes until `shutdown` fires.
    ///
    /// A pass that is already running when shutdown arrives completes first.
    /// Failed passes are logged and the schedule continues.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) -> SchedulerStats {
        let mut ticker = tokio::time::interval(self.interval);
        // A pass longer than the interval drops the ticks it overran.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut stats = SchedulerStats::default();

        info!("Starting sync schedule, interval {:?}", self.interval);

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Received shutdown signal");
                    break;
                }
                _ = ticker.tick() => {
                    match self.engine.run_pass().await {
                        Ok(PassOutcome::Completed(_)) => stats.completed += 1,
                        Ok(PassOutcome::NoNewData { .. }) => stats.no_data += 1,
                        Ok(PassOutcome::Skipped) => stats.skipped += 1,
                        Err(e) => {
                            error!("Sync pass failed: {e:#}");
                            stats.failed += 1;
                        }
                    }
                }
            }
        }

        info!(
            "Sync schedule stopped after {} passes ({} completed, {} without new data, {} skipped, {} failed)",
            stats.passes(),
            stats.completed,
            stats.no_data,
            stats.skipped,
            stats.failed
        );
        stats
    }
}
