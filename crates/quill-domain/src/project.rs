//! Project module - the tenant boundary

use crate::ProjectId;

/// Default idle time before a client becomes a deactivation candidate (24h)
pub const DEFAULT_CLIENT_DEACTIVATE_THRESHOLD_SECS: u64 = 24 * 3600;

/// A project owns clients and documents and is enumerated by housekeeping in
/// id order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectInfo {
    /// Unique identifier; defines the enumeration order
    pub id: ProjectId,

    /// Human-readable name, unique per deployment
    pub name: String,

    /// Clients idle for at least this long are deactivation candidates
    pub client_deactivate_threshold_secs: u64,

    /// When this project was created (Unix seconds)
    pub created_at: u64,
}

impl ProjectInfo {
    /// Create a project with the default deactivation threshold
    pub fn new(name: impl Into<String>, created_at: u64) -> Self {
        Self {
            id: ProjectId::new(),
            name: name.into(),
            client_deactivate_threshold_secs: DEFAULT_CLIENT_DEACTIVATE_THRESHOLD_SECS,
            created_at,
        }
    }

    /// Override the client deactivation threshold
    pub fn with_client_deactivate_threshold_secs(mut self, secs: u64) -> Self {
        self.client_deactivate_threshold_secs = secs;
        self
    }
}
