//! Trade record state machine
//!
//! One record per transfer attempt, identified by `(from_account_id,
//! nonce)` — the idempotency key. `Pending` is the only non-terminal
//! state; `Confirmed` and `Canceled` are terminal and mutually exclusive.
//! Transitions mutate the status and append domain events; persistence of
//! both happens in the saga service, inside the same transaction as the
//! triggering balance mutation.

use crate::domain::event::TradeEvent;
use crate::money::Money;
use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

/// TCC saga status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i16)]
pub enum TccStatus {
    Pending = 0,
    Confirmed = 1,
    Canceled = 2,
}

impl TccStatus {
    /// Numeric ID for storage.
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(TccStatus::Pending),
            1 => Some(TccStatus::Confirmed),
            2 => Some(TccStatus::Canceled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TccStatus::Pending => "pending",
            TccStatus::Confirmed => "confirmed",
            TccStatus::Canceled => "canceled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TccStatus::Pending)
    }
}

impl fmt::Display for TccStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One transfer attempt.
#[derive(Debug, Clone)]
pub struct TradeRecord {
    pub transaction_id: Uuid,
    pub nonce: i64,
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: Money,
    pub status: TccStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    events: Vec<TradeEvent>,
}

impl TradeRecord {
    /// Create a new record in `Pending` with a fresh transaction id.
    pub fn open(nonce: i64, from: i64, to: i64, amount: Money) -> Self {
        let now = Utc::now();
        Self {
            transaction_id: Uuid::new_v4(),
            nonce,
            from_account_id: from,
            to_account_id: to,
            amount,
            status: TccStatus::Pending,
            created_at: now,
            updated_at: now,
            events: Vec::new(),
        }
    }

    /// Rebuild a record from storage. No buffered events.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        transaction_id: Uuid,
        nonce: i64,
        from: i64,
        to: i64,
        amount: Money,
        status: TccStatus,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            transaction_id,
            nonce,
            from_account_id: from,
            to_account_id: to,
            amount,
            status,
            created_at,
            updated_at,
            events: Vec::new(),
        }
    }

    /// Try phase: mark pending and record the reservation event.
    pub fn transfer(&mut self) {
        self.transition(TccStatus::Pending);
        self.push_event(TccStatus::Pending, self.to_account_id);
    }

    /// Confirm phase: two events — the unreserve side (funds released at
    /// the source) and the credit side (destination credited).
    pub fn confirm(&mut self) {
        self.transition(TccStatus::Confirmed);
        self.push_event(TccStatus::Confirmed, self.from_account_id);
        self.push_event(TccStatus::Confirmed, self.to_account_id);
    }

    /// Cancel phase: reserved funds return to the source's own available
    /// balance.
    pub fn cancel(&mut self) {
        self.transition(TccStatus::Canceled);
        self.push_event(TccStatus::Canceled, self.from_account_id);
    }

    /// Drain the buffered events, leaving the record empty.
    pub fn pull_events(&mut self) -> Vec<TradeEvent> {
        std::mem::take(&mut self.events)
    }

    fn transition(&mut self, status: TccStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    fn push_event(&mut self, action: TccStatus, credit_account: i64) {
        self.events.push(TradeEvent {
            transaction_id: self.transaction_id,
            action: action.as_str().to_string(),
            from_account_id: self.from_account_id,
            to_account_id: credit_account,
            amount: self.amount,
        });
    }
}

impl fmt::Display for TradeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Trade[{}] {} -> {} nonce={} amount={} status={}",
            self.transaction_id,
            self.from_account_id,
            self.to_account_id,
            self.nonce,
            self.amount,
            self.status
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        assert_eq!(TccStatus::from_id(0), Some(TccStatus::Pending));
        assert_eq!(TccStatus::from_id(1), Some(TccStatus::Confirmed));
        assert_eq!(TccStatus::from_id(2), Some(TccStatus::Canceled));
        assert_eq!(TccStatus::from_id(3), None);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!TccStatus::Pending.is_terminal());
        assert!(TccStatus::Confirmed.is_terminal());
        assert!(TccStatus::Canceled.is_terminal());
    }

    #[test]
    fn test_open_starts_pending() {
        let record = TradeRecord::open(100, 1, 2, Money::from(50));
        assert_eq!(record.status, TccStatus::Pending);
        assert_eq!(record.nonce, 100);

        let other = TradeRecord::open(100, 1, 2, Money::from(50));
        assert_ne!(record.transaction_id, other.transaction_id);
    }

    #[test]
    fn test_transfer_appends_pending_event() {
        let mut record = TradeRecord::open(100, 1, 2, Money::from(50));
        record.transfer();

        let events = record.pull_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, "pending");
        assert_eq!(events[0].from_account_id, 1);
        assert_eq!(events[0].to_account_id, 2);
        assert_eq!(events[0].amount, Money::from(50));
    }

    #[test]
    fn test_confirm_appends_both_legs() {
        let mut record = TradeRecord::open(100, 1, 2, Money::from(50));
        record.transfer();
        record.pull_events();

        record.confirm();
        assert_eq!(record.status, TccStatus::Confirmed);

        let events = record.pull_events();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.action == "confirmed"));
        // unreserve leg credits the source, credit leg the destination
        assert_eq!(events[0].to_account_id, 1);
        assert_eq!(events[1].to_account_id, 2);
    }

    #[test]
    fn test_cancel_credits_source() {
        let mut record = TradeRecord::open(100, 1, 2, Money::from(50));
        record.transfer();
        record.pull_events();

        record.cancel();
        assert_eq!(record.status, TccStatus::Canceled);

        let events = record.pull_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, "canceled");
        assert_eq!(events[0].to_account_id, 1);
    }

    #[test]
    fn test_pull_events_drains() {
        let mut record = TradeRecord::open(100, 1, 2, Money::from(50));
        record.transfer();

        assert_eq!(record.pull_events().len(), 1);
        assert!(record.pull_events().is_empty());
    }
}
