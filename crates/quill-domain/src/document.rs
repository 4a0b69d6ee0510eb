//! Document records

use crate::{DocumentId, ProjectId};
use std::fmt;
use std::time::Duration;

/// Locates a document within its project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocRefKey {
    /// Owning project
    pub project_id: ProjectId,
    /// Document id
    pub doc_id: DocumentId,
}

impl fmt::Display for DocRefKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "doc({}/{})", self.project_id, self.doc_id)
    }
}

/// A document as stored by the database
///
/// Removal is two-phase: `removed_at` marks a soft delete, and housekeeping
/// hard-deletes the row once the grace period has passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocInfo {
    /// Unique identifier
    pub id: DocumentId,
    /// Owning project
    pub project_id: ProjectId,
    /// User-facing document key
    pub key: String,
    /// Creation time (Unix seconds)
    pub created_at: u64,
    /// Soft-deletion time (Unix seconds), if removed
    pub removed_at: Option<u64>,
}

impl DocInfo {
    /// Reference key used by the hard-deletion action
    pub fn ref_key(&self) -> DocRefKey {
        DocRefKey {
            project_id: self.project_id,
            doc_id: self.id,
        }
    }

    /// Whether the document has been soft-deleted
    pub fn is_removed(&self) -> bool {
        self.removed_at.is_some()
    }

    /// Whether the soft deletion is at least `grace_period` old at `now`
    pub fn is_past_grace_period(&self, grace_period: Duration, now: u64) -> bool {
        match self.removed_at {
            Some(removed_at) => removed_at <= now.saturating_sub(grace_period.as_secs()),
            None => false,
        }
    }
}
