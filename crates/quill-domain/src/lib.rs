//! Quill Domain Layer
//!
//! Core records and port traits shared by every other Quill crate.
//! Infrastructure (SQLite, lock services) lives elsewhere; this crate only
//! depends on `uuid` for identifiers and `async-trait` for the ports.
//!
//! ## Key Concepts
//!
//! - **Project**: the tenant boundary owning clients and documents
//! - **Client**: an SDK instance attached to a project; idle ones get deactivated
//! - **Document**: collaborative content; soft-deleted first, hard-deleted later
//! - **Lease**: one acquisition of a named cluster-wide lock
//!
//! ## Ports
//!
//! - [`traits::Database`]: tenant listing, candidate lookup and the
//!   side-effecting housekeeping actions
//! - [`traits::Coordinator`]: named mutual-exclusion leases

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod document;
pub mod ids;
pub mod lock;
pub mod project;
pub mod traits;

// Re-exports for convenience
pub use client::{ClientInfo, ClientRefKey, ClientStatus};
pub use document::{DocInfo, DocRefKey};
pub use ids::{ClientId, DocumentId, ProjectId};
pub use lock::{Lease, LockKey};
pub use project::ProjectInfo;

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in seconds since the Unix epoch
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
