//! TCC saga steps
//!
//! Try (`transfer`), Confirm and Cancel, each executed strictly inside an
//! already-open unit-of-work transaction and under the account pair lock
//! held by the caller. Any error aborts the whole transaction, so a
//! half-applied phase can never be observed.

use crate::domain::{EventRecord, TccStatus, TradeRecord};
use crate::error::{AppError, ErrorKind};
use crate::money::Money;
use crate::repository::TradeStore;

#[derive(Debug, Clone, Copy, Default)]
pub struct TransferSaga;

impl TransferSaga {
    pub fn new() -> Self {
        Self
    }

    /// Try phase: reserve `amount` on the source and open a Pending trade
    /// record for `(from, nonce)`.
    pub async fn transfer(
        &self,
        store: &mut dyn TradeStore,
        nonce: i64,
        from: i64,
        to: i64,
        amount: Money,
    ) -> Result<(), AppError> {
        // destination accounts materialize lazily, zero-balanced
        let destination = store
            .accounts()
            .get_account(to)
            .await
            .map_err(|e| AppError::wrap(ErrorKind::GetAccount, "transfer phase - get to account", e))?;
        if destination.is_none() {
            store.accounts().create_account(to).await.map_err(|e| {
                AppError::wrap(ErrorKind::CreateAccount, "transfer phase - create account", e)
            })?;
        }

        // idempotency guard: the nonce is burned by any prior Try for this
        // source, whatever state that attempt reached
        match store.trades().get_trade_record(nonce, from, None).await {
            Ok(None) => {}
            Ok(Some(_)) => {
                return Err(AppError::new(
                    ErrorKind::Conflict,
                    "transfer phase - conflict nonce",
                ));
            }
            Err(e) => {
                return Err(AppError::wrap(
                    ErrorKind::Conflict,
                    "transfer phase - conflict nonce",
                    e,
                ));
            }
        }

        let mut source = store
            .accounts()
            .get_account(from)
            .await
            .map_err(|e| {
                AppError::wrap(ErrorKind::GetAccount, "transfer phase - get from account", e)
            })?
            .ok_or_else(|| {
                AppError::new(ErrorKind::GetAccount, "transfer phase - get from account")
            })?;

        // in-memory precondition: fail fast before any write
        source.reserve(amount)?;

        store
            .accounts()
            .reserve_balance(from, amount)
            .await
            .map_err(|e| {
                AppError::wrap(ErrorKind::ReserveBalance, "transfer phase - reserve balance", e)
            })?;

        let mut record = TradeRecord::open(nonce, from, to, amount);
        record.transfer();

        store
            .trades()
            .create_trade_record(&record)
            .await
            .map_err(|e| {
                AppError::wrap(ErrorKind::CreateTrade, "transfer phase - create transaction", e)
            })?;

        self.flush_events(store, &mut record, "transfer phase").await
    }

    /// Confirm phase: release the reservation and credit the destination.
    pub async fn confirm(
        &self,
        store: &mut dyn TradeStore,
        nonce: i64,
        from: i64,
        to: i64,
    ) -> Result<(), AppError> {
        let mut record = self.pending_record(store, nonce, from, "confirm phase").await?;

        if record.to_account_id != to {
            return Err(AppError::new(
                ErrorKind::InvalidRequest,
                "confirm phase - to account id mismatch",
            ));
        }

        self.check_unreserve(store, from, record.amount, "confirm phase")
            .await?;

        store
            .accounts()
            .unreserve_balance(from, to, record.amount)
            .await
            .map_err(|e| {
                AppError::wrap(ErrorKind::UnreserveBalance, "confirm phase - unreserve balance", e)
            })?;

        record.confirm();
        store
            .trades()
            .update_trade_record(&record)
            .await
            .map_err(|e| {
                AppError::wrap(ErrorKind::UpdateTrade, "confirm phase - update transaction", e)
            })?;

        self.flush_events(store, &mut record, "confirm phase").await
    }

    /// Cancel phase: roll the reservation back into the source's own
    /// available balance.
    pub async fn cancel(
        &self,
        store: &mut dyn TradeStore,
        nonce: i64,
        from: i64,
        to: i64,
    ) -> Result<(), AppError> {
        let mut record = self.pending_record(store, nonce, from, "cancel phase").await?;

        if record.to_account_id != to {
            return Err(AppError::new(
                ErrorKind::InvalidRequest,
                "cancel phase - to account id mismatch",
            ));
        }

        self.check_unreserve(store, from, record.amount, "cancel phase")
            .await?;

        store
            .accounts()
            .unreserve_balance(from, from, record.amount)
            .await
            .map_err(|e| {
                AppError::wrap(ErrorKind::UnreserveBalance, "cancel phase - unreserve balance", e)
            })?;

        record.cancel();
        store
            .trades()
            .update_trade_record(&record)
            .await
            .map_err(|e| {
                AppError::wrap(ErrorKind::UpdateTrade, "cancel phase - update transaction", e)
            })?;

        self.flush_events(store, &mut record, "cancel phase").await
    }

    /// Look up the Pending record for `(from, nonce)`. A record in a
    /// terminal state no longer matches, which is what rejects a second
    /// Confirm or a Cancel-after-Confirm.
    async fn pending_record(
        &self,
        store: &mut dyn TradeStore,
        nonce: i64,
        from: i64,
        phase: &str,
    ) -> Result<TradeRecord, AppError> {
        store
            .trades()
            .get_trade_record(nonce, from, Some(TccStatus::Pending))
            .await
            .map_err(|e| {
                AppError::wrap(ErrorKind::GetTrade, format!("{} - get transaction", phase), e)
            })?
            .ok_or_else(|| {
                AppError::new(ErrorKind::GetTrade, format!("{} - transaction not found", phase))
            })
    }

    /// Invariant check before releasing reserved funds: the source must
    /// actually hold the reservation. Failure aborts the transaction.
    async fn check_unreserve(
        &self,
        store: &mut dyn TradeStore,
        from: i64,
        amount: Money,
        phase: &str,
    ) -> Result<(), AppError> {
        let mut source = store
            .accounts()
            .get_account(from)
            .await
            .map_err(|e| {
                AppError::wrap(ErrorKind::GetAccount, format!("{} - get from account", phase), e)
            })?
            .ok_or_else(|| {
                AppError::new(ErrorKind::GetAccount, format!("{} - get from account", phase))
            })?;

        source.unreserve(amount)
    }

    /// Drain the record's buffered events into the outbox. Runs in the
    /// same transaction as the transition that produced them.
    async fn flush_events(
        &self,
        store: &mut dyn TradeStore,
        record: &mut TradeRecord,
        phase: &str,
    ) -> Result<(), AppError> {
        for event in record.pull_events() {
            let payload = serde_json::to_string(&event).map_err(|e| {
                AppError::wrap(
                    ErrorKind::PayloadMarshal,
                    format!("{} - marshal event payload", phase),
                    e,
                )
            })?;

            let row = EventRecord::new(event.transaction_id, event.action.as_str(), payload);
            store
                .events()
                .create_transaction_event(&row)
                .await
                .map_err(|e| {
                    AppError::wrap(ErrorKind::CreateEvent, format!("{} - create event", phase), e)
                })?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{MemoryUnitOfWork, UnitOfWork};

    async fn try_transfer(
        uow: &MemoryUnitOfWork,
        nonce: i64,
        from: i64,
        to: i64,
        amount: Money,
    ) -> Result<(), AppError> {
        let saga = TransferSaga::new();
        uow.transaction(Box::new(move |store| {
            Box::pin(async move { saga.transfer(store, nonce, from, to, amount).await })
        }))
        .await
    }

    async fn confirm(
        uow: &MemoryUnitOfWork,
        nonce: i64,
        from: i64,
        to: i64,
    ) -> Result<(), AppError> {
        let saga = TransferSaga::new();
        uow.transaction(Box::new(move |store| {
            Box::pin(async move { saga.confirm(store, nonce, from, to).await })
        }))
        .await
    }

    async fn cancel(
        uow: &MemoryUnitOfWork,
        nonce: i64,
        from: i64,
        to: i64,
    ) -> Result<(), AppError> {
        let saga = TransferSaga::new();
        uow.transaction(Box::new(move |store| {
            Box::pin(async move { saga.cancel(store, nonce, from, to).await })
        }))
        .await
    }

    #[tokio::test]
    async fn test_try_reserves_and_opens_pending_record() {
        let uow = MemoryUnitOfWork::new();
        uow.seed_account(1, Money::from(1000)).await;

        try_transfer(&uow, 100, 1, 2, Money::from(100)).await.unwrap();

        let source = uow.account(1).await.unwrap();
        assert_eq!(source.available_balance, Money::from(900));
        assert_eq!(source.reserved_balance, Money::from(100));

        // destination created lazily, untouched by Try
        let destination = uow.account(2).await.unwrap();
        assert_eq!(destination.available_balance, Money::ZERO);

        let record = uow.trade(1, 100).await.unwrap();
        assert_eq!(record.status, TccStatus::Pending);

        let events = uow.events().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "pending");
    }

    #[tokio::test]
    async fn test_try_insufficient_balance_rolls_back() {
        let uow = MemoryUnitOfWork::new();
        uow.seed_account(1, Money::from(50)).await;

        let err = try_transfer(&uow, 100, 1, 2, Money::from(100)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientBalance);

        let source = uow.account(1).await.unwrap();
        assert_eq!(source.available_balance, Money::from(50));
        assert_eq!(source.reserved_balance, Money::ZERO);
        assert!(uow.trade(1, 100).await.is_none());
        assert!(uow.events().await.is_empty());
        // even the lazily-created destination rolls back
        assert!(uow.account(2).await.is_none());
    }

    #[tokio::test]
    async fn test_nonce_reuse_is_conflict_regardless_of_state() {
        let uow = MemoryUnitOfWork::new();
        uow.seed_account(1, Money::from(1000)).await;

        try_transfer(&uow, 100, 1, 2, Money::from(100)).await.unwrap();
        confirm(&uow, 100, 1, 2).await.unwrap();

        // same nonce, different destination and amount: still a conflict
        let err = try_transfer(&uow, 100, 1, 3, Money::from(1)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let source = uow.account(1).await.unwrap();
        assert_eq!(source.available_balance, Money::from(900));
        assert_eq!(source.reserved_balance, Money::ZERO);
    }

    #[tokio::test]
    async fn test_confirm_moves_amount_and_conserves_total() {
        let uow = MemoryUnitOfWork::new();
        uow.seed_account(1, Money::from(1000)).await;
        uow.seed_account(2, Money::from(500)).await;

        try_transfer(&uow, 100, 1, 2, Money::from(100)).await.unwrap();
        confirm(&uow, 100, 1, 2).await.unwrap();

        let source = uow.account(1).await.unwrap();
        let destination = uow.account(2).await.unwrap();
        assert_eq!(source.available_balance, Money::from(900));
        assert_eq!(source.reserved_balance, Money::ZERO);
        assert_eq!(destination.available_balance, Money::from(600));
        assert_eq!(destination.reserved_balance, Money::ZERO);

        let total = source.available_balance
            + source.reserved_balance
            + destination.available_balance
            + destination.reserved_balance;
        assert_eq!(total, Money::from(1500));

        assert_eq!(uow.trade(1, 100).await.unwrap().status, TccStatus::Confirmed);

        // pending event + two confirm legs
        let events = uow.events().await;
        assert_eq!(events.len(), 3);
        assert_eq!(
            events.iter().filter(|e| e.event_type == "confirmed").count(),
            2
        );
    }

    #[tokio::test]
    async fn test_confirm_rejects_destination_mismatch() {
        let uow = MemoryUnitOfWork::new();
        uow.seed_account(1, Money::from(1000)).await;

        try_transfer(&uow, 100, 1, 2, Money::from(100)).await.unwrap();

        let err = confirm(&uow, 100, 1, 3).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        assert!(err.context().contains("to account id mismatch"));

        // nothing moved, record still pending
        let source = uow.account(1).await.unwrap();
        assert_eq!(source.reserved_balance, Money::from(100));
        assert_eq!(uow.trade(1, 100).await.unwrap().status, TccStatus::Pending);
    }

    #[tokio::test]
    async fn test_cancel_restores_source_balance() {
        let uow = MemoryUnitOfWork::new();
        uow.seed_account(1, Money::from(1000)).await;

        try_transfer(&uow, 200, 1, 2, Money::from(50)).await.unwrap();
        cancel(&uow, 200, 1, 2).await.unwrap();

        let source = uow.account(1).await.unwrap();
        assert_eq!(source.available_balance, Money::from(1000));
        assert_eq!(source.reserved_balance, Money::ZERO);

        // destination never received anything
        let destination = uow.account(2).await.unwrap();
        assert_eq!(destination.available_balance, Money::ZERO);

        assert_eq!(uow.trade(1, 200).await.unwrap().status, TccStatus::Canceled);

        let events = uow.events().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].event_type, "canceled");
    }

    #[tokio::test]
    async fn test_terminal_states_are_exclusive() {
        let uow = MemoryUnitOfWork::new();
        uow.seed_account(1, Money::from(1000)).await;

        try_transfer(&uow, 100, 1, 2, Money::from(100)).await.unwrap();
        confirm(&uow, 100, 1, 2).await.unwrap();

        // confirmed record no longer matches the Pending filter
        let err = cancel(&uow, 100, 1, 2).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::GetTrade);

        let err = confirm(&uow, 100, 1, 2).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::GetTrade);

        assert_eq!(uow.trade(1, 100).await.unwrap().status, TccStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_cancel_then_confirm_is_rejected() {
        let uow = MemoryUnitOfWork::new();
        uow.seed_account(1, Money::from(1000)).await;

        try_transfer(&uow, 300, 1, 2, Money::from(10)).await.unwrap();
        cancel(&uow, 300, 1, 2).await.unwrap();

        let err = confirm(&uow, 300, 1, 2).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::GetTrade);
        assert_eq!(uow.trade(1, 300).await.unwrap().status, TccStatus::Canceled);
    }

    #[tokio::test]
    async fn test_confirm_without_try_fails() {
        let uow = MemoryUnitOfWork::new();
        uow.seed_account(1, Money::from(1000)).await;

        let err = confirm(&uow, 999, 1, 2).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::GetTrade);
    }

    #[tokio::test]
    async fn test_event_payload_snapshot() {
        let uow = MemoryUnitOfWork::new();
        uow.seed_account(1, Money::from(1000)).await;

        try_transfer(&uow, 100, 1, 2, Money::from(100)).await.unwrap();

        let record = uow.trade(1, 100).await.unwrap();
        let events = uow.events_for(record.transaction_id).await;
        assert_eq!(events.len(), 1);

        let payload: serde_json::Value = serde_json::from_str(&events[0].payload).unwrap();
        assert_eq!(payload["action"], "pending");
        assert_eq!(payload["from_account_id"], 1);
        assert_eq!(payload["to_account_id"], 2);
        assert_eq!(payload["amount"], "100");
    }
}
