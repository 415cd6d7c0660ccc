//! Distributed locking
//!
//! Serializes every Try/Confirm/Cancel that touches a given unordered
//! account pair. The [`Locker`] seam is what the coordinator consumes;
//! `postgres` provides the production lease table implementation and
//! `memory` the in-process one used by tests.

pub mod coordinator;
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub use coordinator::LockCoordinator;
pub use memory::MemoryLocker;
pub use postgres::PgLeaseLocker;

#[derive(Debug, Error)]
pub enum LockError {
    /// Lease could not be obtained within the retry budget.
    #[error("lock not obtained: {0}")]
    NotObtained(String),

    /// Lease no longer held by this owner (expired and stolen, or
    /// already released).
    #[error("lock lost: {0}")]
    Lost(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Lease acquisition. Implementations retry with linear backoff until the
/// lease is obtained or the budget runs out.
#[async_trait]
pub trait Locker: Send + Sync {
    async fn acquire(
        &self,
        key: &str,
        lease: Duration,
        retry_interval: Duration,
    ) -> Result<Box<dyn LockGuard>, LockError>;
}

/// A held lease. TTL self-heals a stuck lock, so `release` failures are
/// logged by the coordinator rather than propagated.
#[async_trait]
pub trait LockGuard: Send + Sync {
    async fn renew(&self, ttl: Duration) -> Result<(), LockError>;
    async fn release(&self) -> Result<(), LockError>;
}

/// Canonical lock key for an account pair: the numerically smaller id
/// always comes first, so A->B and B->A contend on the same key.
pub fn lock_key(from: i64, to: i64) -> String {
    if from < to {
        format!("transfer_lock:{}:{}", from, to)
    } else {
        format!("transfer_lock:{}:{}", to, from)
    }
}
