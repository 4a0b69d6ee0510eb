//! Client records

use crate::{ClientId, ProjectId};
use std::fmt;

/// Activation status of a client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientStatus {
    /// Client is attached and may sync documents
    Activated,
    /// Client was deactivated (explicitly or by housekeeping)
    Deactivated,
}

impl ClientStatus {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientStatus::Activated => "activated",
            ClientStatus::Deactivated => "deactivated",
        }
    }

    /// Parse from string representation
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "activated" => Some(ClientStatus::Activated),
            "deactivated" => Some(ClientStatus::Deactivated),
            _ => None,
        }
    }
}

/// Locates a client within its project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientRefKey {
    /// Owning project
    pub project_id: ProjectId,
    /// Client id
    pub client_id: ClientId,
}

impl fmt::Display for ClientRefKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client({}/{})", self.project_id, self.client_id)
    }
}

/// A client as stored by the database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    /// Unique identifier
    pub id: ClientId,
    /// Owning project
    pub project_id: ProjectId,
    /// SDK-provided key
    pub key: String,
    /// Current status
    pub status: ClientStatus,
    /// Creation time (Unix seconds)
    pub created_at: u64,
    /// Last activity time (Unix seconds)
    pub updated_at: u64,
}

impl ClientInfo {
    /// Reference key used by the deactivation action
    pub fn ref_key(&self) -> ClientRefKey {
        ClientRefKey {
            project_id: self.project_id,
            client_id: self.id,
        }
    }

    /// Whether the client is still activated
    pub fn is_active(&self) -> bool {
        self.status == ClientStatus::Activated
    }
}
