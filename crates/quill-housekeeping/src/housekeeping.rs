//! Housekeeping service wiring both sweep loops to the store and lock ports

use crate::{
    ClientDeactivation, Cursor, DocumentHardDeletion, HousekeepingConfig, HousekeepingError,
    HousekeepingMetrics, SchedulerLoop, SharedMetrics, SweepExecutor, SweepKind, SweepOutcome,
};
use quill_domain::traits::{Coordinator, Database};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Periodic housekeeping for one server replica
///
/// Owns one [`SchedulerLoop`] per sweep kind. Every replica of a cluster runs
/// its own `Housekeeping`; the shared [`Coordinator`] makes sure at most one
/// sweep of each kind runs at a time cluster-wide.
///
/// # Examples
///
/// ```no_run
/// use quill_housekeeping::{Housekeeping, HousekeepingConfig};
/// use quill_store::SqliteStore;
/// use quill_sync::MemoryCoordinator;
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = Arc::new(SqliteStore::new("quill.db")?);
///     let coordinator = Arc::new(MemoryCoordinator::default());
///     let config = HousekeepingConfig::default();
///     let mut housekeeping = Housekeeping::new(config, store, coordinator)?;
///
///     housekeeping.start()?;
///     tokio::signal::ctrl_c().await?;
///     housekeeping.stop();
///     housekeeping.join().await?;
///     Ok(())
/// }
/// ```
pub struct Housekeeping<D, C> {
    config: HousekeepingConfig,
    database: Arc<D>,
    coordinator: Arc<C>,
    metrics: SharedMetrics,
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
    started: bool,
}

impl<D, C> Housekeeping<D, C>
where
    D: Database + 'static,
    C: Coordinator + 'static,
{
    /// Create the service, rejecting invalid configuration
    pub fn new(
        config: HousekeepingConfig,
        database: Arc<D>,
        coordinator: Arc<C>,
    ) -> Result<Self, HousekeepingError> {
        config.validate()?;
        let (shutdown, _) = watch::channel(false);
        Ok(Self {
            config,
            database,
            coordinator,
            metrics: SharedMetrics::new(),
            shutdown,
            handles: Vec::new(),
            started: false,
        })
    }

    /// Configuration in use
    pub fn config(&self) -> &HousekeepingConfig {
        &self.config
    }

    fn client_deactivation(&self) -> SweepExecutor<D, C, ClientDeactivation> {
        SweepExecutor::new(
            Arc::clone(&self.database),
            Arc::clone(&self.coordinator),
            ClientDeactivation::new(self.config.client_deactivation_candidate_limit_per_project),
            self.config.project_fetch_size,
        )
    }

    fn document_hard_deletion(&self) -> SweepExecutor<D, C, DocumentHardDeletion> {
        SweepExecutor::new(
            Arc::clone(&self.database),
            Arc::clone(&self.coordinator),
            DocumentHardDeletion::new(
                self.config.document_hard_deletion_candidate_limit_per_project,
                self.config.document_hard_deletion_grace_period(),
            ),
            self.config.project_fetch_size,
        )
    }

    /// Spawn both sweep loops on the current runtime
    ///
    /// Returns immediately. A service can be started only once.
    pub fn start(&mut self) -> Result<(), HousekeepingError> {
        if self.started {
            return Err(HousekeepingError::Worker(
                "housekeeping already started".to_string(),
            ));
        }
        if *self.shutdown.borrow() {
            return Err(HousekeepingError::Worker(
                "housekeeping already stopped".to_string(),
            ));
        }
        self.started = true;

        let deactivation = SchedulerLoop::new(
            self.client_deactivation(),
            self.config.interval_deactivate_candidates(),
            self.metrics.clone(),
            self.shutdown.subscribe(),
        );
        let hard_deletion = SchedulerLoop::new(
            self.document_hard_deletion(),
            self.config.interval_delete_documents(),
            self.metrics.clone(),
            self.shutdown.subscribe(),
        );

        self.handles.push(tokio::spawn(deactivation.run()));
        self.handles.push(tokio::spawn(hard_deletion.run()));

        tracing::info!(
            "Housekeeping started (project fetch size: {})",
            self.config.project_fetch_size
        );
        Ok(())
    }

    /// Signal both loops to exit
    ///
    /// Does not wait. A loop in the middle of a sweep finishes it first; use
    /// [`Housekeeping::join`] to wait for that.
    pub fn stop(&self) {
        self.shutdown.send_replace(true);
    }

    /// Wait for both loops to exit
    pub async fn join(mut self) -> Result<(), HousekeepingError> {
        for handle in self.handles.drain(..) {
            handle
                .await
                .map_err(|e| HousekeepingError::Worker(e.to_string()))?;
        }
        tracing::info!(
            "Housekeeping stopped. Final metrics:\n{}",
            self.metrics.snapshot().summary()
        );
        Ok(())
    }

    /// Run one sweep of each kind from the start of the project cycle
    ///
    /// Stops at the first failing sweep. Outcomes are recorded in
    /// [`Housekeeping::metrics`] the same way the loops record them.
    pub async fn run_once(&self) -> Result<Vec<SweepOutcome>, HousekeepingError> {
        let deactivation = self.client_deactivation();
        let result = deactivation.run(Cursor::start()).await;
        let deactivated = self.record(deactivation.kind(), result)?;

        let hard_deletion = self.document_hard_deletion();
        let result = hard_deletion.run(Cursor::start()).await;
        let deleted = self.record(hard_deletion.kind(), result)?;
        Ok(vec![deactivated, deleted])
    }

    fn record(
        &self,
        kind: SweepKind,
        result: Result<SweepOutcome, HousekeepingError>,
    ) -> Result<SweepOutcome, HousekeepingError> {
        match &result {
            Ok(outcome) => self.metrics.record_success(outcome),
            Err(_) => self.metrics.record_failure(kind),
        }
        result
    }

    /// Snapshot of the counters collected so far
    pub fn metrics(&self) -> HousekeepingMetrics {
        self.metrics.snapshot()
    }
}

impl<D, C> Drop for Housekeeping<D, C> {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}
