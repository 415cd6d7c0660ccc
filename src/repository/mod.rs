//! Repository and unit-of-work boundary.
//!
//! The saga service depends on these traits only; `postgres` binds them to
//! sqlx and `memory` provides the in-process double used by tests. A
//! [`UnitOfWork::transaction`] call hands the callback a [`TradeStore`]
//! whose repositories all read and write through one database
//! transaction: the callback returning `Ok` commits, any error rolls the
//! whole attempt back.

pub mod db;
pub mod memory;
pub mod postgres;
pub mod schema;

use async_trait::async_trait;
use futures::future::BoxFuture;
use thiserror::Error;

use crate::domain::{Account, EventRecord, TccStatus, TradeRecord};
use crate::error::AppError;
use crate::money::Money;

pub use db::Database;
pub use memory::MemoryUnitOfWork;
pub use postgres::PgUnitOfWork;

/// Error surfaced by repository implementations. The saga wraps it with
/// the failing step's error kind and phase label.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Other(String),
}

/// Account persistence within an open transaction.
#[async_trait]
pub trait AccountRepository: Send {
    /// Create a zero-balanced account. Creating an account that already
    /// exists is a no-op.
    async fn create_account(&mut self, user_id: i64) -> Result<(), RepoError>;

    /// Load an account; `None` is the distinguishable not-found case.
    async fn get_account(&mut self, user_id: i64) -> Result<Option<Account>, RepoError>;

    /// Atomically move `amount` from available to reserved.
    async fn reserve_balance(&mut self, user_id: i64, amount: Money) -> Result<(), RepoError>;

    /// Atomically release `amount` from `from`'s reserved pool and credit
    /// it to `credit_to`'s available balance. Confirm passes the
    /// destination, Cancel passes the source itself.
    async fn unreserve_balance(
        &mut self,
        from: i64,
        credit_to: i64,
        amount: Money,
    ) -> Result<(), RepoError>;
}

/// Trade record persistence within an open transaction.
#[async_trait]
pub trait TradeRepository: Send {
    async fn create_trade_record(&mut self, record: &TradeRecord) -> Result<(), RepoError>;

    /// Upsert on the `(from_account_id, nonce)` unique key, refreshing the
    /// status of an existing row.
    async fn create_or_update_trade_record(
        &mut self,
        record: &TradeRecord,
    ) -> Result<(), RepoError>;

    async fn update_trade_record(&mut self, record: &TradeRecord) -> Result<(), RepoError>;

    /// Look up by `(from_account_id, nonce)`, optionally filtered to one
    /// status. `None` filter matches any status.
    async fn get_trade_record(
        &mut self,
        nonce: i64,
        from: i64,
        status: Option<TccStatus>,
    ) -> Result<Option<TradeRecord>, RepoError>;
}

/// Outbox persistence within an open transaction.
#[async_trait]
pub trait EventRepository: Send {
    async fn create_transaction_event(&mut self, event: &EventRecord) -> Result<(), RepoError>;
}

/// Transactional view handed to the unit-of-work callback.
pub trait TradeStore: Send {
    fn accounts(&mut self) -> &mut dyn AccountRepository;
    fn trades(&mut self) -> &mut dyn TradeRepository;
    fn events(&mut self) -> &mut dyn EventRepository;
}

/// Callback executed inside one transaction.
pub type TxFn =
    Box<dyn for<'t> FnOnce(&'t mut dyn TradeStore) -> BoxFuture<'t, Result<(), AppError>> + Send>;

/// Transaction runner. Commit on `Ok`, roll back on error — partial
/// Try/Confirm/Cancel state is never persisted.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    async fn transaction(&self, f: TxFn) -> Result<(), AppError>;
}
