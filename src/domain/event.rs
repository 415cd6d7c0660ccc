//! Domain events and their outbox representation.
//!
//! A [`TradeEvent`] is accumulated on the trade record in memory when a
//! status transition happens; the saga drains them and persists each as an
//! [`EventRecord`] row in the same database transaction as the transition
//! itself, so downstream consumers can replay the effect even if the
//! process dies right after commit.

use crate::money::Money;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// In-memory effect of a trade status transition.
///
/// Serialized verbatim into the outbox payload column.
#[derive(Debug, Clone, Serialize)]
pub struct TradeEvent {
    pub transaction_id: Uuid,
    pub action: String,
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: Money,
}

/// Outbox row (`transaction_events` table). Append-only; `id` and
/// `created_at` are assigned by the store.
#[derive(Debug, Clone)]
pub struct EventRecord {
    pub id: i64,
    pub transaction_id: Uuid,
    pub event_type: String,
    pub payload: String,
    pub created_at: DateTime<Utc>,
}

impl EventRecord {
    pub fn new(transaction_id: Uuid, event_type: impl Into<String>, payload: String) -> Self {
        Self {
            id: 0,
            transaction_id,
            event_type: event_type.into(),
            payload,
            created_at: Utc::now(),
        }
    }
}
