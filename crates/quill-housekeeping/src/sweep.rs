//! Sweep kinds and the capability set each one plugs into the executor

use async_trait::async_trait;
use quill_domain::traits::Database;
use quill_domain::{ClientInfo, DocInfo, LockKey, ProjectInfo};
use std::fmt;
use std::time::Duration;

/// The housekeeping tasks, each with its own loop, cursor and lock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SweepKind {
    /// Deactivate clients idle past their project's threshold
    DeactivateCandidates,
    /// Hard-delete documents soft-deleted past the grace period
    DocumentHardDeletion,
}

impl SweepKind {
    /// Both kinds, in start order
    pub const ALL: [SweepKind; 2] = [
        SweepKind::DeactivateCandidates,
        SweepKind::DocumentHardDeletion,
    ];

    /// Cluster-wide lock guarding one sweep of this kind
    pub fn lock_key(&self) -> LockKey {
        match self {
            SweepKind::DeactivateCandidates => LockKey::from("housekeeping/deactivateCandidates"),
            SweepKind::DocumentHardDeletion => {
                LockKey::from("housekeeping/documentHardDeletionLock")
            }
        }
    }

    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            SweepKind::DeactivateCandidates => "deactivate-candidates",
            SweepKind::DocumentHardDeletion => "document-hard-deletion",
        }
    }

    /// Past-tense verb for the action's effect in batch log lines
    pub fn verb(&self) -> &'static str {
        match self {
            SweepKind::DeactivateCandidates => "deactivated",
            SweepKind::DocumentHardDeletion => "hard deleted",
        }
    }
}

impl fmt::Display for SweepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a sweep kind contributes to the generic executor: how to find
/// candidates in one project and how to act on a batch of them
#[async_trait]
pub trait Sweep<D: Database>: Send + Sync + 'static {
    /// Record type this sweep acts on
    type Candidate: Send + Sync;

    /// Which sweep this is
    fn kind(&self) -> SweepKind;

    /// Candidates of one project, capped by the per-project limit
    async fn find_candidates(
        &self,
        database: &D,
        project: &ProjectInfo,
    ) -> Result<Vec<Self::Candidate>, D::Error>;

    /// Apply the side effect to a batch, returning how many records it changed
    async fn apply(&self, database: &D, candidates: &[Self::Candidate]) -> Result<usize, D::Error>;
}

/// Deactivates idle clients, one store call per client
///
/// The first failure aborts the batch. Clients deactivated before the
/// failure stay deactivated.
#[derive(Debug, Clone)]
pub struct ClientDeactivation {
    candidate_limit_per_project: usize,
}

impl ClientDeactivation {
    /// Create the sweep with its per-project candidate cap
    pub fn new(candidate_limit_per_project: usize) -> Self {
        Self {
            candidate_limit_per_project,
        }
    }
}

#[async_trait]
impl<D: Database> Sweep<D> for ClientDeactivation {
    type Candidate = ClientInfo;

    fn kind(&self) -> SweepKind {
        SweepKind::DeactivateCandidates
    }

    async fn find_candidates(
        &self,
        database: &D,
        project: &ProjectInfo,
    ) -> Result<Vec<ClientInfo>, D::Error> {
        database
            .find_deactivate_candidates_per_project(project, self.candidate_limit_per_project)
            .await
    }

    async fn apply(&self, database: &D, candidates: &[ClientInfo]) -> Result<usize, D::Error> {
        let mut deactivated = 0;
        for client in candidates {
            if let Err(e) = database.deactivate_client(client.ref_key()).await {
                tracing::warn!(
                    "Deactivation aborted at {} after {} of {} candidates",
                    client.ref_key(),
                    deactivated,
                    candidates.len()
                );
                return Err(e);
            }
            deactivated += 1;
        }
        Ok(deactivated)
    }
}

/// Hard-deletes documents soft-deleted at least `grace_period` ago, as one
/// batch store call
#[derive(Debug, Clone)]
pub struct DocumentHardDeletion {
    candidate_limit_per_project: usize,
    grace_period: Duration,
}

impl DocumentHardDeletion {
    /// Create the sweep with its per-project cap and grace period
    pub fn new(candidate_limit_per_project: usize, grace_period: Duration) -> Self {
        Self {
            candidate_limit_per_project,
            grace_period,
        }
    }
}

#[async_trait]
impl<D: Database> Sweep<D> for DocumentHardDeletion {
    type Candidate = DocInfo;

    fn kind(&self) -> SweepKind {
        SweepKind::DocumentHardDeletion
    }

    async fn find_candidates(
        &self,
        database: &D,
        project: &ProjectInfo,
    ) -> Result<Vec<DocInfo>, D::Error> {
        database
            .find_document_hard_deletion_candidates_per_project(
                project,
                self.candidate_limit_per_project,
                self.grace_period,
            )
            .await
    }

    async fn apply(&self, database: &D, candidates: &[DocInfo]) -> Result<usize, D::Error> {
        database.delete_documents(candidates).await
    }
}
