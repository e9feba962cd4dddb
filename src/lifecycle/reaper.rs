//! Background sweeper for expired cache entries and idle rate-limit clients.
//!
//! Both stores already expire lazily on access; the reaper bounds memory
//! held by keys nobody asks for again.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::lookup::{ClientLimiter, LookupCache};
use crate::observability::metrics;

/// What one sweep removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub expired_entries: usize,
    pub idle_clients: usize,
}

/// Periodically sweeps the shared cache and limiter.
#[derive(Debug, Clone)]
pub struct Reaper {
    cache: Arc<LookupCache>,
    limiter: Arc<ClientLimiter>,
    interval: Duration,
}

impl Reaper {
    pub fn new(cache: Arc<LookupCache>, limiter: Arc<ClientLimiter>, interval: Duration) -> Self {
        Self {
            cache,
            limiter,
            interval,
        }
    }

    /// Run a single sweep now.
    pub fn sweep(&self) -> SweepReport {
        let report = SweepReport {
            expired_entries: self.cache.cleanup_expired(),
            idle_clients: self.limiter.cleanup_idle_clients(),
        };

        metrics::record_sweep(report.expired_entries, report.idle_clients);
        if report.expired_entries > 0 || report.idle_clients > 0 {
            tracing::info!(
                expired_entries = report.expired_entries,
                idle_clients = report.idle_clients,
                "Reaper sweep"
            );
        }

        report
    }

    /// Start sweeping every `interval` until `shutdown` fires or the handle
    /// is dropped. The first sweep happens one full interval after spawn.
    pub fn spawn(self, mut shutdown: broadcast::Receiver<()>) -> ReaperHandle {
        let period = self.interval;
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            tracing::debug!(interval = ?period, "Reaper started");
            loop {
                tokio::select! {
                    _ = shutdown.recv() => break,
                    _ = ticker.tick() => {
                        self.sweep();
                    }
                }
            }
            tracing::debug!("Reaper stopped");
        });

        ReaperHandle { task: Some(task) }
    }
}

/// Owner of a running reaper task. Dropping it aborts the task.
#[derive(Debug)]
pub struct ReaperHandle {
    task: Option<JoinHandle<()>>,
}

impl ReaperHandle {
    /// Wait for the task to finish after shutdown has been signalled.
    pub async fn stop(mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    tracing::error!(error = %e, "Reaper task failed");
                }
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

impl Drop for ReaperHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
