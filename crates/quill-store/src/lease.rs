//! Named leases stored in the shared database
//!
//! A row in `housekeeping_locks` is the lock. Acquisition inserts the row, or
//! takes it over once `expires_at` has passed, in one upsert statement.
//! Renewal pushes `expires_at` forward and release deletes the row, both only
//! while the row still carries the caller's token.
//!
//! `expires_at` is in Unix milliseconds so that sub-second ttls behave.

use crate::{SqliteStore, StoreError};
use async_trait::async_trait;
use quill_domain::traits::Coordinator;
use quill_domain::{now_secs, Lease, LockKey};
use rusqlite::params;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::Instant;

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Timing for leases taken through [`SqliteStore`]
#[derive(Debug, Clone, Copy)]
pub struct LeaseOptions {
    /// How long a lease stays valid without being released
    pub ttl: Duration,
    /// How long `acquire` waits for a held lock before failing
    pub acquire_timeout: Duration,
    /// Delay between attempts while waiting
    pub poll_interval: Duration,
}

impl Default for LeaseOptions {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60),
            acquire_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(100),
        }
    }
}

impl LeaseOptions {
    /// Heartbeat period for a holder, a third of the ttl
    pub fn renew_interval(&self) -> Duration {
        (self.ttl / 3).max(Duration::from_millis(1))
    }

    fn ttl_millis(&self) -> i64 {
        self.ttl.as_millis() as i64
    }
}

impl SqliteStore {
    fn try_acquire(&self, key: &LockKey) -> Result<Option<Lease>, StoreError> {
        let lease = Lease::new(key.clone(), now_secs());
        let now = now_millis();
        let expires_at = now + self.lease_options.ttl_millis();

        let changed = self.conn()?.execute(
            "INSERT INTO housekeeping_locks (lock_key, token, holder, expires_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(lock_key) DO UPDATE SET
             token = excluded.token, holder = excluded.holder, expires_at = excluded.expires_at
             WHERE housekeeping_locks.expires_at <= ?5",
            params![
                key.as_str(),
                &lease.token.to_be_bytes()[..],
                &self.holder,
                expires_at,
                now,
            ],
        )?;

        Ok((changed == 1).then_some(lease))
    }
}

#[async_trait]
impl Coordinator for SqliteStore {
    type Error = StoreError;

    async fn acquire(&self, key: &LockKey) -> Result<Lease, Self::Error> {
        let deadline = Instant::now() + self.lease_options.acquire_timeout;

        loop {
            if let Some(lease) = self.try_acquire(key)? {
                tracing::debug!("Acquired lock {} as {}", key, self.holder);
                return Ok(lease);
            }

            if Instant::now() >= deadline {
                return Err(StoreError::LockTimeout(key.to_string()));
            }
            tokio::time::sleep(self.lease_options.poll_interval).await;
        }
    }

    async fn renew(&self, lease: &Lease) -> Result<(), Self::Error> {
        let now = now_millis();
        let changed = self.conn()?.execute(
            "UPDATE housekeeping_locks SET expires_at = ?1
             WHERE lock_key = ?2 AND token = ?3 AND expires_at > ?4",
            params![
                now + self.lease_options.ttl_millis(),
                lease.key.as_str(),
                &lease.token.to_be_bytes()[..],
                now,
            ],
        )?;

        if changed == 0 {
            return Err(StoreError::LeaseLost(lease.key.to_string()));
        }
        tracing::trace!("Renewed lock {} as {}", lease.key, self.holder);
        Ok(())
    }

    async fn release(&self, lease: Lease) -> Result<(), Self::Error> {
        let changed = self.conn()?.execute(
            "DELETE FROM housekeeping_locks WHERE lock_key = ?1 AND token = ?2",
            params![lease.key.as_str(), &lease.token.to_be_bytes()[..]],
        )?;

        if changed == 0 {
            return Err(StoreError::LeaseLost(lease.key.to_string()));
        }
        Ok(())
    }

    fn renew_interval(&self) -> Option<Duration> {
        Some(self.lease_options.renew_interval())
    }
}
