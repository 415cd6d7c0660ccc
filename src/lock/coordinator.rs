//! Lock coordinator
//!
//! Wraps an operation in a held lease: acquire, keep the lease alive from
//! a renewal loop ticking at half the lease duration, race the two, and
//! always attempt release on the way out. If renewal fails while the
//! operation is still running, the operation future is dropped and the
//! renew error surfaces; once the operation has finished, its result wins.

use std::sync::Arc;
use std::time::Duration;

use super::{Locker, lock_key};
use crate::config::LockConfig;
use crate::error::{AppError, ErrorKind};

#[derive(Clone)]
pub struct LockCoordinator {
    locker: Arc<dyn Locker>,
    lease: Duration,
    retry_interval: Duration,
}

impl LockCoordinator {
    pub fn new(locker: Arc<dyn Locker>, lease: Duration, retry_interval: Duration) -> Self {
        Self {
            locker,
            lease,
            retry_interval,
        }
    }

    pub fn from_config(locker: Arc<dyn Locker>, config: &LockConfig) -> Self {
        Self::new(
            locker,
            Duration::from_secs(config.lock_duration_secs),
            Duration::from_millis(config.retry_interval_ms),
        )
    }

    /// Run `op` while holding the lease for the canonical account pair key.
    pub async fn with_account_pair_lock<T, F>(
        &self,
        from: i64,
        to: i64,
        op: F,
    ) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        self.with_lock(&lock_key(from, to), op).await
    }

    async fn with_lock<T, F>(&self, key: &str, op: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        let guard = self
            .locker
            .acquire(key, self.lease, self.retry_interval)
            .await
            .map_err(|e| AppError::wrap(ErrorKind::LockAcquire, "failed to acquire lock", e))?;

        let renew_loop = async {
            let mut ticker = tokio::time::interval(self.lease / 2);
            // the first tick of an interval completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = guard.renew(self.lease).await {
                    break e;
                }
            }
        };

        let result = tokio::select! {
            res = op => res,
            renew_err = renew_loop => {
                Err(AppError::wrap(ErrorKind::LockRenew, "failed to renew lock", renew_err))
            }
        };

        if let Err(e) = guard.release().await {
            tracing::error!(key, error = %e, "failed to release lock");
        }

        result
    }
}
