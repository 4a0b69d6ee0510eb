//! The generic sweep algorithm shared by every sweep kind

use crate::{Cursor, HousekeepingError, Sweep, SweepKind};
use quill_domain::traits::{Coordinator, Database};
use quill_domain::Lease;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;

/// Result of one successful sweep
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepOutcome {
    /// Which sweep ran
    pub kind: SweepKind,
    /// Cursor the next sweep resumes from
    pub next_cursor: Cursor,
    /// Candidates collected across the visited projects
    pub candidates: usize,
    /// Records the action actually changed
    pub affected: usize,
    /// Wall time including lock acquisition
    pub elapsed: Duration,
}

/// Runs one bounded sweep: lock, page through projects from a cursor, collect
/// capped candidates per project, act on the batch, unlock
pub struct SweepExecutor<D, C, S> {
    database: Arc<D>,
    coordinator: Arc<C>,
    sweep: S,
    project_fetch_size: usize,
}

impl<D, C, S> SweepExecutor<D, C, S>
where
    D: Database,
    C: Coordinator,
    S: Sweep<D>,
{
    /// Create an executor visiting `project_fetch_size` projects per sweep
    pub fn new(database: Arc<D>, coordinator: Arc<C>, sweep: S, project_fetch_size: usize) -> Self {
        Self {
            database,
            coordinator,
            sweep,
            project_fetch_size,
        }
    }

    /// Which sweep this executor runs
    pub fn kind(&self) -> SweepKind {
        self.sweep.kind()
    }

    /// Run one sweep starting from `cursor`
    ///
    /// On error the caller keeps its current cursor. The lock is released on
    /// every path once acquired; a failed release is logged, not returned.
    ///
    /// While the sweep runs the lease is renewed on the coordinator's
    /// heartbeat. If a renewal fails the sweep is dropped at its next await
    /// point and [`HousekeepingError::LeaseLost`] is returned, since another
    /// replica may already hold the lock.
    pub async fn run(&self, cursor: Cursor) -> Result<SweepOutcome, HousekeepingError> {
        let start = Instant::now();
        let key = self.kind().lock_key();

        let lease = self
            .coordinator
            .acquire(&key)
            .await
            .map_err(|e| HousekeepingError::Lock {
                key: key.to_string(),
                message: e.to_string(),
            })?;

        let result = match self.coordinator.renew_interval() {
            Some(every) => tokio::select! {
                result = self.run_locked(cursor, start) => result,
                lost = self.keep_alive(&lease, every) => Err(lost),
            },
            None => self.run_locked(cursor, start).await,
        };

        if let Err(e) = self.coordinator.release(lease).await {
            tracing::error!("Failed to release lock {}: {}", key, e);
        }

        result
    }

    /// Renew `lease` every `every`; only returns once a renewal fails
    async fn keep_alive(&self, lease: &Lease, every: Duration) -> HousekeepingError {
        let every = every.max(Duration::from_millis(1));
        let mut heartbeat = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            heartbeat.tick().await;
            if let Err(e) = self.coordinator.renew(lease).await {
                tracing::error!("Lost lock {} during {} sweep: {}", lease.key, self.kind(), e);
                return HousekeepingError::LeaseLost {
                    key: lease.key.to_string(),
                    message: e.to_string(),
                };
            }
        }
    }

    async fn run_locked(
        &self,
        cursor: Cursor,
        start: Instant,
    ) -> Result<SweepOutcome, HousekeepingError> {
        let (next_cursor, candidates) = self.find_candidates(cursor).await?;

        let affected = if candidates.is_empty() {
            0
        } else {
            self.sweep
                .apply(self.database.as_ref(), &candidates)
                .await
                .map_err(HousekeepingError::store)?
        };

        let outcome = SweepOutcome {
            kind: self.kind(),
            next_cursor,
            candidates: candidates.len(),
            affected,
            elapsed: start.elapsed(),
        };

        if outcome.candidates > 0 {
            tracing::info!(
                "HSKP: candidates {}, {} {}, {:?}",
                outcome.candidates,
                outcome.kind.verb(),
                outcome.affected,
                outcome.elapsed
            );
        }

        Ok(outcome)
    }

    /// Collect candidates from the next page of projects after `cursor`
    ///
    /// Candidates keep project order, then store order within a project.
    /// Returns the cursor for the following sweep along with the batch.
    pub async fn find_candidates(
        &self,
        cursor: Cursor,
    ) -> Result<(Cursor, Vec<S::Candidate>), HousekeepingError> {
        let projects = self
            .database
            .find_next_n_cycling_project_infos(self.project_fetch_size, cursor.after())
            .await
            .map_err(HousekeepingError::store)?;

        let mut candidates = Vec::new();
        for project in &projects {
            let found = self
                .sweep
                .find_candidates(self.database.as_ref(), project)
                .await
                .map_err(HousekeepingError::store)?;
            candidates.extend(found);
        }

        let next_cursor = Cursor::advance(&projects, self.project_fetch_size);
        tracing::debug!(
            "{}: visited {} projects from {}, next {}",
            self.kind(),
            projects.len(),
            cursor,
            next_cursor
        );

        Ok((next_cursor, candidates))
    }
}
