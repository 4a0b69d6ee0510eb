//! Configuration for housekeeping
//!
//! Defines per-sweep intervals, per-project candidate limits, the project page
//! size and the document hard-deletion grace period. All values are static for
//! the lifetime of a [`crate::Housekeeping`] instance.

use crate::HousekeepingError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the housekeeping service
///
/// # Examples
///
/// ```
/// use quill_housekeeping::HousekeepingConfig;
///
/// let config = HousekeepingConfig::default();
/// assert_eq!(config.project_fetch_size, 100);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HousekeepingConfig {
    /// How often to run client deactivation (in seconds)
    /// Default: 30
    pub interval_deactivate_candidates_secs: u64,

    /// How often to run document hard deletion (in seconds)
    /// Default: 30
    pub interval_delete_documents_secs: u64,

    /// Minimum age of a soft deletion before a document is hard-deleted (in seconds)
    /// Default: 14 days
    pub document_hard_deletion_grace_period_secs: u64,

    /// Maximum idle clients taken from one project per sweep
    /// Default: 500
    pub client_deactivation_candidate_limit_per_project: usize,

    /// Maximum soft-deleted documents taken from one project per sweep
    /// Default: 500
    pub document_hard_deletion_candidate_limit_per_project: usize,

    /// Number of projects visited per sweep
    /// Default: 100
    pub project_fetch_size: usize,
}

impl Default for HousekeepingConfig {
    fn default() -> Self {
        Self {
            interval_deactivate_candidates_secs: 30,
            interval_delete_documents_secs: 30,
            document_hard_deletion_grace_period_secs: 14 * 86400,
            client_deactivation_candidate_limit_per_project: 500,
            document_hard_deletion_candidate_limit_per_project: 500,
            project_fetch_size: 100,
        }
    }
}

impl HousekeepingConfig {
    /// Reject values that would stall or spin the sweep loops
    pub fn validate(&self) -> Result<(), HousekeepingError> {
        let zero_checks = [
            (
                "interval_deactivate_candidates_secs",
                self.interval_deactivate_candidates_secs == 0,
            ),
            (
                "interval_delete_documents_secs",
                self.interval_delete_documents_secs == 0,
            ),
            (
                "client_deactivation_candidate_limit_per_project",
                self.client_deactivation_candidate_limit_per_project == 0,
            ),
            (
                "document_hard_deletion_candidate_limit_per_project",
                self.document_hard_deletion_candidate_limit_per_project == 0,
            ),
            ("project_fetch_size", self.project_fetch_size == 0),
        ];

        if let Some((name, _)) = zero_checks.iter().find(|(_, is_zero)| *is_zero) {
            return Err(HousekeepingError::Config(format!(
                "{} must be greater than zero",
                name
            )));
        }

        Ok(())
    }

    /// Client deactivation interval as Duration
    pub fn interval_deactivate_candidates(&self) -> Duration {
        Duration::from_secs(self.interval_deactivate_candidates_secs)
    }

    /// Document hard deletion interval as Duration
    pub fn interval_delete_documents(&self) -> Duration {
        Duration::from_secs(self.interval_delete_documents_secs)
    }

    /// Hard-deletion grace period as Duration
    pub fn document_hard_deletion_grace_period(&self) -> Duration {
        Duration::from_secs(self.document_hard_deletion_grace_period_secs)
    }
}
