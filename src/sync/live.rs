// ABOUTME: Periodic live sync for SyncEngine - one background worker running passes on a schedule
// ABOUTME: Passes never overlap; a tick that arrives while a pass is running is skipped

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::engine::SyncEngine;

impl SyncEngine {
    /// Schedule a pass every `period`, the first one `period` from now.
    ///
    /// Returns once the schedule is running. Fails for a zero period, for an
    /// engine that has been stopped, and when a schedule is already active.
    pub fn live_sync(self: &Arc<Self>, period: Duration) -> Result<()> {
        if period.is_zero() {
            bail!("Sync interval must be greater than zero");
        }
        if self.is_stopped() {
            bail!("Sync has been stopped; create a new engine to sync again");
        }

        let mut worker = self
            .worker
            .lock()
            .map_err(|_| anyhow!("Live sync state is poisoned"))?;
        if worker.is_some() {
            bail!("Live sync is already scheduled");
        }

        tracing::info!("Starting live sync every {:?}", period);
        let engine = Arc::clone(self);
        *worker = Some(tokio::spawn(async move { engine.run_schedule(period).await }));
        Ok(())
    }

    /// Wait until the live schedule ends, returning the number of passes it ran.
    ///
    /// The schedule only ends after [`SyncEngine::stop_sync`]. Returns 0
    /// immediately when no schedule was started.
    pub async fn hold(&self) -> Result<u64> {
        match self.take_worker()? {
            Some(handle) => handle.await.context("Live sync worker panicked"),
            None => Ok(0),
        }
    }

    fn take_worker(&self) -> Result<Option<JoinHandle<u64>>> {
        let mut worker = self
            .worker
            .lock()
            .map_err(|_| anyhow!("Live sync state is poisoned"))?;
        Ok(worker.take())
    }

    async fn run_schedule(self: Arc<Self>, period: Duration) -> u64 {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut passes = 0u64;

        loop {
            tokio::select! {
                biased; // Check for stop first

                _ = self.cancel.cancelled() => {
                    tracing::info!("Live sync stopped after {} passes", passes);
                    break;
                }

                _ = ticker.tick() => {
                    match self.try_sync().await {
                        Some(stats) => {
                            passes += 1;
                            tracing::info!(
                                "Live sync pass {} complete: {} tables, {} rows in {}ms",
                                passes,
                                stats.tables_synced,
                                stats.rows_synced,
                                stats.duration_ms
                            );
                            if !stats.is_success() {
                                tracing::warn!(
                                    "Live sync pass {} had {} errors",
                                    passes,
                                    stats.errors.len()
                                );
                            }
                        }
                        None => {
                            tracing::debug!("Previous pass still running, skipping tick");
                        }
                    }
                }
            }
        }

        passes
    }
}
