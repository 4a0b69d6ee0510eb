//! Background loop driving one sweep kind

use crate::{Cursor, SharedMetrics, Sweep, SweepExecutor};
use quill_domain::traits::{Coordinator, Database};
use tokio::sync::watch;
use tokio::time::Duration;

/// Runs one [`SweepExecutor`] forever, threading its cursor between sweeps
///
/// After a successful sweep the loop waits `interval` or until shutdown. After
/// a failed sweep it retries straight away with the cursor unchanged; only a
/// shutdown requested in the meantime ends the loop. A sweep that is already
/// running is never interrupted.
pub struct SchedulerLoop<D, C, S> {
    executor: SweepExecutor<D, C, S>,
    interval: Duration,
    cursor: Cursor,
    metrics: SharedMetrics,
    shutdown: watch::Receiver<bool>,
}

impl<D, C, S> SchedulerLoop<D, C, S>
where
    D: Database,
    C: Coordinator,
    S: Sweep<D>,
{
    /// Create a loop starting at the beginning of the project cycle
    pub fn new(
        executor: SweepExecutor<D, C, S>,
        interval: Duration,
        metrics: SharedMetrics,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            executor,
            interval,
            cursor: Cursor::start(),
            metrics,
            shutdown,
        }
    }

    /// Where the next sweep will resume
    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Run until shutdown is signalled
    pub async fn run(mut self) {
        let kind = self.executor.kind();
        tracing::info!("{} loop started (interval: {:?})", kind, self.interval);

        loop {
            match self.executor.run(self.cursor).await {
                Ok(outcome) => {
                    self.metrics.record_success(&outcome);
                    self.cursor = outcome.next_cursor;
                }
                Err(e) => {
                    tracing::error!("{} sweep failed: {}", kind, e);
                    self.metrics.record_failure(kind);
                    if *self.shutdown.borrow() {
                        break;
                    }
                    // Retry without waiting, but let other tasks run
                    tokio::task::yield_now().await;
                    continue;
                }
            }

            let closed = tokio::select! {
                _ = tokio::time::sleep(self.interval) => false,
                changed = self.shutdown.changed() => changed.is_err(),
            };
            if closed || *self.shutdown.borrow() {
                break;
            }
        }

        tracing::info!("{} loop stopped at cursor {}", kind, self.cursor);
    }
}
