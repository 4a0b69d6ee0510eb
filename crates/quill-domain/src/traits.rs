//! Trait definitions for external interactions
//!
//! These traits define the boundaries between housekeeping logic and
//! infrastructure. Implementations live in `quill-store` and `quill-sync`.

use crate::{ClientInfo, ClientRefKey, DocInfo, Lease, LockKey, ProjectId, ProjectInfo};
use async_trait::async_trait;
use std::fmt::Display;
use std::time::Duration;

/// Storage operations housekeeping needs
///
/// Implemented by the infrastructure layer (quill-store)
#[async_trait]
pub trait Database: Send + Sync {
    /// Error type for store operations
    type Error: Display + Send + Sync + 'static;

    /// List up to `page_size` projects whose id is strictly greater than
    /// `last_project_id`, in id order.
    ///
    /// Passing [`ProjectId::DEFAULT`] starts from the first project. A page
    /// shorter than `page_size` means the end of the project set was reached.
    async fn find_next_n_cycling_project_infos(
        &self,
        page_size: usize,
        last_project_id: ProjectId,
    ) -> Result<Vec<ProjectInfo>, Self::Error>;

    /// Activated clients of `project` idle for longer than the project's
    /// deactivation threshold, at most `limit`
    async fn find_deactivate_candidates_per_project(
        &self,
        project: &ProjectInfo,
        limit: usize,
    ) -> Result<Vec<ClientInfo>, Self::Error>;

    /// Documents of `project` soft-deleted at least `grace_period` ago, at
    /// most `limit`
    async fn find_document_hard_deletion_candidates_per_project(
        &self,
        project: &ProjectInfo,
        limit: usize,
        grace_period: Duration,
    ) -> Result<Vec<DocInfo>, Self::Error>;

    /// Deactivate one client, returning its updated record
    async fn deactivate_client(&self, ref_key: ClientRefKey) -> Result<ClientInfo, Self::Error>;

    /// Hard-delete the given documents, returning how many rows were removed
    ///
    /// Documents that are no longer soft-deleted are skipped, so the count
    /// may be lower than `candidates.len()`.
    async fn delete_documents(&self, candidates: &[DocInfo]) -> Result<usize, Self::Error>;
}

/// Named cluster-wide mutual exclusion
///
/// Implemented by quill-sync (in-process) and quill-store (shared database)
#[async_trait]
pub trait Coordinator: Send + Sync {
    /// Error type for lock operations
    type Error: Display + Send + Sync + 'static;

    /// Acquire `key`, waiting while another holder has it
    ///
    /// Implementations bound the wait and fail once it runs out.
    async fn acquire(&self, key: &LockKey) -> Result<Lease, Self::Error>;

    /// Extend a held lease so it outlives a long sweep
    ///
    /// Fails if the lease is no longer the current holder of its lock, for
    /// example because it expired and another replica took it over.
    async fn renew(&self, lease: &Lease) -> Result<(), Self::Error>;

    /// Release a lease previously returned by [`Coordinator::acquire`]
    async fn release(&self, lease: Lease) -> Result<(), Self::Error>;

    /// How often a holder must call [`Coordinator::renew`] to keep its lease
    ///
    /// `None` means leases never expire on their own.
    fn renew_interval(&self) -> Option<Duration> {
        None
    }
}
