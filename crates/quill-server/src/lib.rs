//! Quill Server
//!
//! Hosts housekeeping for one replica. Every replica opens the same SQLite
//! database, which by default doubles as the lock service, so sweeps of a
//! given kind never overlap across replicas. `[lock] backend = "memory"`
//! swaps in process-local locks for single-replica deployments.

#![warn(missing_docs)]

pub mod config;

use config::{LockBackend, ServerConfig};
use quill_domain::traits::Coordinator;
use quill_housekeeping::{Housekeeping, HousekeepingError};
use quill_store::{SqliteStore, StoreError};
use quill_sync::MemoryCoordinator;
use std::sync::Arc;
use tracing::{info, warn};

/// Server error
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Database could not be opened
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Housekeeping failed to start, run or stop
    #[error("Housekeeping error: {0}")]
    Housekeeping(#[from] HousekeepingError),

    /// Waiting for the shutdown signal failed
    #[error("Signal error: {0}")]
    Signal(#[from] std::io::Error),
}

fn open_store(config: &ServerConfig) -> Result<Arc<SqliteStore>, ServerError> {
    info!("Opening database {}", config.database.path.display());
    let store =
        SqliteStore::new(&config.database.path)?.with_lease_options(config.lock.lease_options());
    Ok(Arc::new(store))
}

fn housekeeping<C: Coordinator + 'static>(
    config: &ServerConfig,
    store: Arc<SqliteStore>,
    coordinator: Arc<C>,
) -> Result<Housekeeping<SqliteStore, C>, ServerError> {
    Ok(Housekeeping::new(config.housekeeping.clone(), store, coordinator)?)
}

fn memory_coordinator(config: &ServerConfig) -> Arc<MemoryCoordinator> {
    warn!("Using process-local locks; run housekeeping on a single replica only");
    Arc::new(MemoryCoordinator::new(config.lock.lease_options().acquire_timeout))
}

/// Run one sweep of each kind and return
pub async fn run_once(config: ServerConfig) -> Result<(), ServerError> {
    let store = open_store(&config)?;
    match config.lock.backend {
        LockBackend::Sqlite => {
            info!("Replica lock holder: {}", store.holder());
            sweep_once(housekeeping(&config, Arc::clone(&store), store)?).await
        }
        LockBackend::Memory => {
            let coordinator = memory_coordinator(&config);
            sweep_once(housekeeping(&config, store, coordinator)?).await
        }
    }
}

async fn sweep_once<C: Coordinator + 'static>(
    housekeeping: Housekeeping<SqliteStore, C>,
) -> Result<(), ServerError> {
    for outcome in housekeeping.run_once().await? {
        info!(
            "{}: {} candidates, {} {} in {:?}",
            outcome.kind,
            outcome.candidates,
            outcome.kind.verb(),
            outcome.affected,
            outcome.elapsed
        );
    }

    Ok(())
}

/// Run housekeeping until Ctrl+C
pub async fn start_server(config: ServerConfig) -> Result<(), ServerError> {
    info!("Starting Quill housekeeping");
    info!(
        "Intervals: deactivation {}s, hard deletion {}s",
        config.housekeeping.interval_deactivate_candidates_secs,
        config.housekeeping.interval_delete_documents_secs
    );

    let store = open_store(&config)?;
    match config.lock.backend {
        LockBackend::Sqlite => {
            info!("Replica lock holder: {}", store.holder());
            serve(housekeeping(&config, Arc::clone(&store), store)?).await
        }
        LockBackend::Memory => {
            let coordinator = memory_coordinator(&config);
            serve(housekeeping(&config, store, coordinator)?).await
        }
    }
}

async fn serve<C: Coordinator + 'static>(
    mut housekeeping: Housekeeping<SqliteStore, C>,
) -> Result<(), ServerError> {
    housekeeping.start()?;

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, stopping housekeeping");

    housekeeping.stop();
    housekeeping.join().await?;
    Ok(())
}
