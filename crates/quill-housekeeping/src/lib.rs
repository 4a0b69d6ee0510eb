//! Quill Housekeeping
//!
//! Background maintenance for a multi-tenant document-collaboration backend.
//!
//! # Overview
//!
//! Housekeeping runs two independent periodic sweeps on every server replica:
//! - **Client deactivation**: clients idle past their project's threshold are
//!   deactivated, one store call each
//! - **Document hard deletion**: documents soft-deleted longer than the grace
//!   period are removed for good, in one batch store call
//!
//! # Architecture
//!
//! Both sweeps share one algorithm, [`SweepExecutor`]:
//!
//! 1. Acquire the sweep's cluster-wide lock through the [`Coordinator`] port
//! 2. List the next page of projects strictly after the loop's [`Cursor`]
//! 3. Collect up to the per-project limit of candidates from each project
//! 4. Apply the sweep's action to the whole batch
//! 5. Release the lock
//!
//! Steps 2 to 4 run while a heartbeat renews the lease. If a renewal fails the
//! sweep stops where it is and reports [`HousekeepingError::LeaseLost`].
//!
//! A sweep therefore touches a bounded number of projects and records, and a
//! long-lived [`SchedulerLoop`] walks the whole project set round-robin by
//! threading the cursor from one sweep to the next. A short project page
//! sends the cursor back to the start of the cycle.
//!
//! ## Loop behaviour
//!
//! | Sweep result | Cursor | Next sweep |
//! |--------------|--------|------------|
//! | Success | Advanced (or reset on a short page) | After the interval |
//! | Lock, store or action error | Unchanged | Immediately |
//!
//! # Usage
//!
//! ## One-time Sweep
//!
//! ```no_run
//! use quill_housekeeping::{Housekeeping, HousekeepingConfig};
//! use quill_store::SqliteStore;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(SqliteStore::new("quill.db")?);
//! let housekeeping = Housekeeping::new(HousekeepingConfig::default(), Arc::clone(&store), store)?;
//!
//! for outcome in housekeeping.run_once().await? {
//!     println!("{}: {} of {}", outcome.kind, outcome.affected, outcome.candidates);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! Housekeeping can be configured via TOML:
//!
//! ```toml
//! [housekeeping]
//! interval_deactivate_candidates_secs = 30
//! interval_delete_documents_secs = 30
//! document_hard_deletion_grace_period_secs = 1209600
//! client_deactivation_candidate_limit_per_project = 500
//! document_hard_deletion_candidate_limit_per_project = 500
//! project_fetch_size = 100
//! ```
//!
//! [`Coordinator`]: quill_domain::traits::Coordinator

#![warn(missing_docs)]

mod config;
mod cursor;
mod error;
mod executor;
mod housekeeping;
mod metrics;
mod scheduler;
mod sweep;

#[cfg(test)]
mod mock;

pub use config::HousekeepingConfig;
pub use cursor::Cursor;
pub use error::HousekeepingError;
pub use executor::{SweepExecutor, SweepOutcome};
pub use housekeeping::Housekeeping;
pub use metrics::{HousekeepingMetrics, SharedMetrics, SweepMetrics};
pub use scheduler::SchedulerLoop;
pub use sweep::{ClientDeactivation, DocumentHardDeletion, Sweep, SweepKind};
