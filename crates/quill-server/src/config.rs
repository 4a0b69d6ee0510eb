//! Configuration file parsing for the server.
//!
//! Loads the database location, lease timing and housekeeping settings from
//! a TOML file. Every section is optional and falls back to its defaults.

use quill_housekeeping::HousekeepingConfig;
use quill_store::LeaseOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Server configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// A value is out of range
    #[error("Invalid configuration value: {0}")]
    Invalid(String),
}

/// Server configuration loaded from TOML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Shared database
    pub database: DatabaseConfig,

    /// Lock service used to serialize sweeps
    pub lock: LockConfig,

    /// Sweep schedule and limits
    pub housekeeping: HousekeepingConfig,
}

/// Database location
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file shared by all replicas
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("quill.db"),
        }
    }
}

/// Where sweep locks live
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockBackend {
    /// Leases in the shared database, exclusive across every replica
    #[default]
    Sqlite,
    /// Process-local locks; only safe when a single replica runs housekeeping
    Memory,
}

/// Lock backend and its timing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Lock service (default: sqlite)
    pub backend: LockBackend,

    /// Lease lifetime between heartbeats, sqlite only (default: 60)
    pub lease_ttl_secs: u64,

    /// How long a sweep waits for its lock (default: 10)
    pub acquire_timeout_secs: u64,

    /// Delay between acquisition attempts (default: 100)
    pub poll_interval_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        let defaults = LeaseOptions::default();
        Self {
            backend: LockBackend::default(),
            lease_ttl_secs: defaults.ttl.as_secs(),
            acquire_timeout_secs: defaults.acquire_timeout.as_secs(),
            poll_interval_ms: defaults.poll_interval.as_millis() as u64,
        }
    }
}

impl LockConfig {
    /// Lease options for [`quill_store::SqliteStore::with_lease_options`]
    pub fn lease_options(&self) -> LeaseOptions {
        LeaseOptions {
            ttl: Duration::from_secs(self.lease_ttl_secs),
            acquire_timeout: Duration::from_secs(self.acquire_timeout_secs),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: ServerConfig = toml::from_str(contents)?;

        if config.lock.lease_ttl_secs == 0 {
            return Err(ConfigError::Invalid(
                "lock.lease_ttl_secs must be greater than zero".to_string(),
            ));
        }
        if config.lock.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "lock.poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        config
            .housekeeping
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        Ok(config)
    }
}
