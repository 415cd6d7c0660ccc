//! In-memory unit of work
//!
//! Process-local implementation of the repository traits, used by the
//! integration tests and anywhere the full stack should run without
//! PostgreSQL. Transaction semantics are real: the callback works on a
//! snapshot of the state, which replaces the shared state only on `Ok` —
//! an error drops the snapshot, so partial writes never become visible.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

use super::{
    AccountRepository, EventRepository, RepoError, TradeRepository, TradeStore, TxFn, UnitOfWork,
};
use crate::domain::{Account, EventRecord, TccStatus, TradeRecord};
use crate::error::AppError;
use crate::money::Money;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
struct State {
    accounts: HashMap<i64, Account>,
    // keyed by (from_account_id, nonce) — the idempotency key
    trades: HashMap<(i64, i64), TradeRecord>,
    events: Vec<EventRecord>,
    next_event_id: i64,
}

/// In-memory [`UnitOfWork`]. Transactions are serialized by an async
/// mutex, mirroring the exclusive writes a database transaction gives the
/// Postgres implementation.
#[derive(Default)]
pub struct MemoryUnitOfWork {
    state: Mutex<State>,
}

impl MemoryUnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an account with the given available balance.
    pub async fn seed_account(&self, user_id: i64, available: Money) {
        let mut state = self.state.lock().await;
        state.accounts.insert(
            user_id,
            Account {
                available_balance: available,
                ..Account::open(user_id)
            },
        );
    }

    pub async fn account(&self, user_id: i64) -> Option<Account> {
        self.state.lock().await.accounts.get(&user_id).cloned()
    }

    pub async fn trade(&self, from: i64, nonce: i64) -> Option<TradeRecord> {
        self.state.lock().await.trades.get(&(from, nonce)).cloned()
    }

    pub async fn events(&self) -> Vec<EventRecord> {
        self.state.lock().await.events.clone()
    }

    pub async fn events_for(&self, transaction_id: Uuid) -> Vec<EventRecord> {
        self.state
            .lock()
            .await
            .events
            .iter()
            .filter(|e| e.transaction_id == transaction_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn transaction(&self, f: TxFn) -> Result<(), AppError> {
        let mut guard = self.state.lock().await;
        let mut store = MemoryStore {
            state: guard.clone(),
        };

        let result = f(&mut store).await;
        match result {
            Ok(()) => {
                *guard = store.state;
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}

/// Snapshot the callback mutates. Committed by the unit of work on `Ok`.
struct MemoryStore {
    state: State,
}

impl TradeStore for MemoryStore {
    fn accounts(&mut self) -> &mut dyn AccountRepository {
        self
    }

    fn trades(&mut self) -> &mut dyn TradeRepository {
        self
    }

    fn events(&mut self) -> &mut dyn EventRepository {
        self
    }
}

#[async_trait]
impl AccountRepository for MemoryStore {
    async fn create_account(&mut self, user_id: i64) -> Result<(), RepoError> {
        self.state
            .accounts
            .entry(user_id)
            .or_insert_with(|| Account::open(user_id));
        Ok(())
    }

    async fn get_account(&mut self, user_id: i64) -> Result<Option<Account>, RepoError> {
        Ok(self.state.accounts.get(&user_id).cloned())
    }

    async fn reserve_balance(&mut self, user_id: i64, amount: Money) -> Result<(), RepoError> {
        let account = self
            .state
            .accounts
            .get_mut(&user_id)
            .ok_or_else(|| RepoError::Other(format!("account {} not found", user_id)))?;

        account.available_balance -= amount;
        account.reserved_balance += amount;
        account.updated_at = chrono::Utc::now();
        Ok(())
    }

    async fn unreserve_balance(
        &mut self,
        from: i64,
        credit_to: i64,
        amount: Money,
    ) -> Result<(), RepoError> {
        let source = self
            .state
            .accounts
            .get_mut(&from)
            .ok_or_else(|| RepoError::Other(format!("account {} not found", from)))?;
        source.reserved_balance -= amount;
        source.updated_at = chrono::Utc::now();

        let target = self
            .state
            .accounts
            .get_mut(&credit_to)
            .ok_or_else(|| RepoError::Other(format!("account {} not found", credit_to)))?;
        target.available_balance += amount;
        target.updated_at = chrono::Utc::now();
        Ok(())
    }
}

#[async_trait]
impl TradeRepository for MemoryStore {
    async fn create_trade_record(&mut self, record: &TradeRecord) -> Result<(), RepoError> {
        let key = (record.from_account_id, record.nonce);
        if self.state.trades.contains_key(&key) {
            return Err(RepoError::Other(format!(
                "duplicate trade record ({}, {})",
                key.0, key.1
            )));
        }
        self.state.trades.insert(key, record.clone());
        Ok(())
    }

    async fn create_or_update_trade_record(
        &mut self,
        record: &TradeRecord,
    ) -> Result<(), RepoError> {
        let key = (record.from_account_id, record.nonce);
        match self.state.trades.get_mut(&key) {
            Some(existing) => {
                existing.status = record.status;
                existing.updated_at = chrono::Utc::now();
            }
            None => {
                self.state.trades.insert(key, record.clone());
            }
        }
        Ok(())
    }

    async fn update_trade_record(&mut self, record: &TradeRecord) -> Result<(), RepoError> {
        let key = (record.from_account_id, record.nonce);
        let existing = self.state.trades.get_mut(&key).ok_or_else(|| {
            RepoError::Other(format!("trade record ({}, {}) not found", key.0, key.1))
        })?;

        existing.status = record.status;
        existing.updated_at = chrono::Utc::now();
        Ok(())
    }

    async fn get_trade_record(
        &mut self,
        nonce: i64,
        from: i64,
        status: Option<TccStatus>,
    ) -> Result<Option<TradeRecord>, RepoError> {
        let record = self.state.trades.get(&(from, nonce));
        Ok(record
            .filter(|r| status.is_none_or(|s| r.status == s))
            .cloned())
    }
}

#[async_trait]
impl EventRepository for MemoryStore {
    async fn create_transaction_event(&mut self, event: &EventRecord) -> Result<(), RepoError> {
        self.state.next_event_id += 1;
        let mut row = event.clone();
        row.id = self.state.next_event_id;
        self.state.events.push(row);
        Ok(())
    }
}
