//! Quill Sync
//!
//! In-process implementation of the [`Coordinator`] port. Suitable for a
//! single-replica deployment and for tests that simulate several replicas
//! inside one process by sharing one `MemoryCoordinator`. Leases live until
//! released, so renewal only confirms the holder.
//!
//! # Examples
//!
//! ```no_run
//! use quill_domain::traits::Coordinator;
//! use quill_domain::LockKey;
//! use quill_sync::MemoryCoordinator;
//! use std::time::Duration;
//!
//! # async fn demo() -> Result<(), quill_sync::SyncError> {
//! let coordinator = MemoryCoordinator::new(Duration::from_secs(5));
//! let lease = coordinator.acquire(&LockKey::from("housekeeping/demo")).await?;
//! coordinator.release(lease).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

use async_trait::async_trait;
use quill_domain::traits::Coordinator;
use quill_domain::{now_secs, Lease, LockKey};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Notify;
use tokio::time::Instant;

/// Errors returned by [`MemoryCoordinator`]
#[derive(Error, Debug)]
pub enum SyncError {
    /// Lock stayed held for the whole acquire timeout
    #[error("Timed out acquiring lock: {0}")]
    Timeout(String),

    /// Lease does not match the current holder of its lock
    #[error("Lock not held by this lease: {0}")]
    NotHeld(String),

    /// Internal mutex was poisoned by a panicking thread
    #[error("Lock table poisoned")]
    Poisoned,
}

/// Named locks held in process memory
pub struct MemoryCoordinator {
    held: Mutex<HashMap<LockKey, u128>>,
    released: Notify,
    acquire_timeout: Duration,
}

impl MemoryCoordinator {
    /// Create a coordinator whose `acquire` gives up after `acquire_timeout`
    pub fn new(acquire_timeout: Duration) -> Self {
        Self {
            held: Mutex::new(HashMap::new()),
            released: Notify::new(),
            acquire_timeout,
        }
    }

    /// Whether `key` is currently held
    pub fn is_locked(&self, key: &LockKey) -> bool {
        self.held
            .lock()
            .map(|held| held.contains_key(key))
            .unwrap_or(false)
    }

    fn try_acquire(&self, key: &LockKey) -> Result<Option<Lease>, SyncError> {
        let mut held = self.held.lock().map_err(|_| SyncError::Poisoned)?;
        if held.contains_key(key) {
            return Ok(None);
        }

        let lease = Lease::new(key.clone(), now_secs());
        held.insert(key.clone(), lease.token);
        Ok(Some(lease))
    }
}

impl Default for MemoryCoordinator {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

#[async_trait]
impl Coordinator for MemoryCoordinator {
    type Error = SyncError;

    async fn acquire(&self, key: &LockKey) -> Result<Lease, Self::Error> {
        let deadline = Instant::now() + self.acquire_timeout;

        loop {
            // Register before checking so a release in between is not missed
            let released = self.released.notified();

            if let Some(lease) = self.try_acquire(key)? {
                return Ok(lease);
            }

            tracing::debug!("Lock {} is held, waiting", key);
            if tokio::time::timeout_at(deadline, released).await.is_err() {
                return Err(SyncError::Timeout(key.to_string()));
            }
        }
    }

    async fn renew(&self, lease: &Lease) -> Result<(), Self::Error> {
        let held = self.held.lock().map_err(|_| SyncError::Poisoned)?;
        match held.get(&lease.key) {
            Some(token) if *token == lease.token => Ok(()),
            _ => Err(SyncError::NotHeld(lease.key.to_string())),
        }
    }

    async fn release(&self, lease: Lease) -> Result<(), Self::Error> {
        {
            let mut held = self.held.lock().map_err(|_| SyncError::Poisoned)?;
            match held.get(&lease.key) {
                Some(token) if *token == lease.token => {
                    held.remove(&lease.key);
                }
                _ => return Err(SyncError::NotHeld(lease.key.to_string())),
            }
        }

        self.released.notify_waiters();
        Ok(())
    }
}
