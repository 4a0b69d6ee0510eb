//! Named cluster-wide locks and the leases that hold them

use std::fmt;

/// Name of a cluster-wide lock
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LockKey(String);

impl LockKey {
    /// Create a lock key
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Borrow the key as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LockKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

/// One successful acquisition of a [`LockKey`]
///
/// The token distinguishes this acquisition from any later one of the same
/// key, so releasing a stale lease cannot free somebody else's lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    /// Lock this lease holds
    pub key: LockKey,
    /// Unique acquisition token (UUIDv7)
    pub token: u128,
    /// When the lease was granted (Unix seconds)
    pub acquired_at: u64,
}

impl Lease {
    /// Create a lease with a fresh token
    pub fn new(key: LockKey, acquired_at: u64) -> Self {
        Self {
            key,
            token: uuid::Uuid::now_v7().as_u128(),
            acquired_at,
        }
    }
}
