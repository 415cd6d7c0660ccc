//! In-process lease locks
//!
//! Same contract as the Postgres locker (TTL, token fencing, linear
//! retry), backed by a mutex-guarded map. Used by the integration tests;
//! `set_fail_renewals` lets coordinator tests force the renew-failure
//! path.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

use super::{LockError, LockGuard, Locker};

struct Lease {
    token: Uuid,
    expires_at: Instant,
}

#[derive(Default)]
pub struct MemoryLocker {
    leases: Arc<Mutex<HashMap<String, Lease>>>,
    fail_renewals: Arc<AtomicBool>,
}

impl MemoryLocker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `renew` fail, simulating a lost lease.
    pub fn set_fail_renewals(&self, fail: bool) {
        self.fail_renewals.store(fail, Ordering::SeqCst);
    }

    /// Number of currently live leases (expired ones excluded).
    pub fn held_count(&self) -> usize {
        let now = Instant::now();
        self.leases
            .lock()
            .unwrap()
            .values()
            .filter(|l| l.expires_at > now)
            .count()
    }

    fn try_acquire(&self, key: &str, token: Uuid, lease: Duration) -> bool {
        let mut leases = self.leases.lock().unwrap();
        let now = Instant::now();
        match leases.get(key) {
            Some(existing) if existing.expires_at > now => false,
            _ => {
                leases.insert(
                    key.to_string(),
                    Lease {
                        token,
                        expires_at: now + lease,
                    },
                );
                true
            }
        }
    }
}

#[async_trait]
impl Locker for MemoryLocker {
    async fn acquire(
        &self,
        key: &str,
        lease: Duration,
        retry_interval: Duration,
    ) -> Result<Box<dyn LockGuard>, LockError> {
        let token = Uuid::new_v4();
        let deadline = Instant::now() + lease;

        loop {
            if self.try_acquire(key, token, lease) {
                return Ok(Box::new(MemoryLockGuard {
                    leases: self.leases.clone(),
                    fail_renewals: self.fail_renewals.clone(),
                    key: key.to_string(),
                    token,
                }));
            }

            if Instant::now() + retry_interval > deadline {
                return Err(LockError::NotObtained(key.to_string()));
            }
            tokio::time::sleep(retry_interval).await;
        }
    }
}

struct MemoryLockGuard {
    leases: Arc<Mutex<HashMap<String, Lease>>>,
    fail_renewals: Arc<AtomicBool>,
    key: String,
    token: Uuid,
}

#[async_trait]
impl LockGuard for MemoryLockGuard {
    async fn renew(&self, ttl: Duration) -> Result<(), LockError> {
        if self.fail_renewals.load(Ordering::SeqCst) {
            return Err(LockError::Lost(self.key.clone()));
        }

        let mut leases = self.leases.lock().unwrap();
        match leases.get_mut(&self.key) {
            Some(lease) if lease.token == self.token => {
                lease.expires_at = Instant::now() + ttl;
                Ok(())
            }
            _ => Err(LockError::Lost(self.key.clone())),
        }
    }

    async fn release(&self) -> Result<(), LockError> {
        let mut leases = self.leases.lock().unwrap();
        match leases.get(&self.key) {
            Some(lease) if lease.token == self.token => {
                leases.remove(&self.key);
                Ok(())
            }
            _ => Err(LockError::Lost(self.key.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_acquire_release_cycle() {
        let locker = MemoryLocker::new();
        let guard = locker
            .acquire("k", Duration::from_secs(1), Duration::from_millis(5))
            .await
            .unwrap();
        assert_eq!(locker.held_count(), 1);

        guard.release().await.unwrap();
        assert_eq!(locker.held_count(), 0);
    }

    #[tokio::test]
    async fn test_held_lease_blocks_contender() {
        let locker = MemoryLocker::new();
        let _guard = locker
            .acquire("k", Duration::from_secs(1), Duration::from_millis(5))
            .await
            .unwrap();

        // contender with a tiny budget gives up
        let contender = locker
            .acquire("k", Duration::from_millis(20), Duration::from_millis(5))
            .await;
        assert!(matches!(contender, Err(LockError::NotObtained(_))));
    }

    #[tokio::test]
    async fn test_expired_lease_is_stolen() {
        let locker = MemoryLocker::new();
        let stale = locker
            .acquire("k", Duration::from_millis(10), Duration::from_millis(5))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;

        let _fresh = locker
            .acquire("k", Duration::from_secs(1), Duration::from_millis(5))
            .await
            .expect("expired lease should be stealable");

        assert!(matches!(
            stale.renew(Duration::from_secs(1)).await,
            Err(LockError::Lost(_))
        ));
        assert!(matches!(stale.release().await, Err(LockError::Lost(_))));
    }

    #[tokio::test]
    async fn test_renew_extends_lease() {
        let locker = MemoryLocker::new();
        let guard = locker
            .acquire("k", Duration::from_millis(40), Duration::from_millis(5))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(25)).await;
        guard.renew(Duration::from_millis(40)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(25)).await;

        // without the renew the lease would have expired by now
        assert_eq!(locker.held_count(), 1);
        guard.release().await.unwrap();
    }
}
