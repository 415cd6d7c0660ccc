//! Trade use-case facade
//!
//! Composes the lock coordinator and the saga: every public operation
//! derives the pair lock key, takes the lease, opens one unit-of-work
//! transaction and runs the saga step(s) inside it. Auto-confirm chains
//! Try and Confirm under the same lease and the same transaction.

use std::sync::Arc;

use crate::config::LockConfig;
use crate::error::{AppError, ErrorKind};
use crate::lock::{LockCoordinator, Locker};
use crate::money::Money;
use crate::repository::UnitOfWork;
use crate::service::saga::TransferSaga;

#[derive(Debug, Clone, Copy)]
pub struct TransferCommand {
    pub from: i64,
    pub to: i64,
    pub nonce: i64,
    pub amount: Money,
    pub auto_confirm: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct ConfirmCommand {
    pub from: i64,
    pub to: i64,
    pub nonce: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct CancelCommand {
    pub from: i64,
    pub to: i64,
    pub nonce: i64,
}

#[derive(Clone)]
pub struct TradeUsecase {
    uow: Arc<dyn UnitOfWork>,
    locks: LockCoordinator,
    saga: TransferSaga,
}

impl TradeUsecase {
    pub fn new(uow: Arc<dyn UnitOfWork>, locker: Arc<dyn Locker>, config: &LockConfig) -> Self {
        Self {
            uow,
            locks: LockCoordinator::from_config(locker, config),
            saga: TransferSaga::new(),
        }
    }

    pub async fn transfer(&self, cmd: TransferCommand) -> Result<(), AppError> {
        validate_pair(cmd.from, cmd.to)?;
        if !cmd.amount.is_positive() {
            return Err(AppError::new(
                ErrorKind::InvalidRequest,
                "amount must be positive",
            ));
        }

        tracing::info!(
            from = cmd.from,
            to = cmd.to,
            nonce = cmd.nonce,
            amount = %cmd.amount,
            auto_confirm = cmd.auto_confirm,
            "transfer requested"
        );

        let saga = self.saga;
        let uow = Arc::clone(&self.uow);
        self.locks
            .with_account_pair_lock(cmd.from, cmd.to, async move {
                uow.transaction(Box::new(move |store| {
                    Box::pin(async move {
                        saga.transfer(store, cmd.nonce, cmd.from, cmd.to, cmd.amount)
                            .await?;

                        if cmd.auto_confirm {
                            saga.confirm(store, cmd.nonce, cmd.from, cmd.to).await?;
                        }

                        Ok(())
                    })
                }))
                .await
            })
            .await
    }

    pub async fn manual_confirm(&self, cmd: ConfirmCommand) -> Result<(), AppError> {
        validate_pair(cmd.from, cmd.to)?;

        tracing::info!(from = cmd.from, to = cmd.to, nonce = cmd.nonce, "confirm requested");

        let saga = self.saga;
        let uow = Arc::clone(&self.uow);
        self.locks
            .with_account_pair_lock(cmd.from, cmd.to, async move {
                uow.transaction(Box::new(move |store| {
                    Box::pin(
                        async move { saga.confirm(store, cmd.nonce, cmd.from, cmd.to).await },
                    )
                }))
                .await
            })
            .await
    }

    pub async fn cancel(&self, cmd: CancelCommand) -> Result<(), AppError> {
        validate_pair(cmd.from, cmd.to)?;

        tracing::info!(from = cmd.from, to = cmd.to, nonce = cmd.nonce, "cancel requested");

        let saga = self.saga;
        let uow = Arc::clone(&self.uow);
        self.locks
            .with_account_pair_lock(cmd.from, cmd.to, async move {
                uow.transaction(Box::new(move |store| {
                    Box::pin(async move { saga.cancel(store, cmd.nonce, cmd.from, cmd.to).await })
                }))
                .await
            })
            .await
    }
}

fn validate_pair(from: i64, to: i64) -> Result<(), AppError> {
    if from <= 0 || to <= 0 {
        return Err(AppError::new(
            ErrorKind::InvalidRequest,
            "account ids must be positive",
        ));
    }
    if from == to {
        return Err(AppError::new(
            ErrorKind::InvalidRequest,
            "source and destination accounts are the same",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::MemoryLocker;
    use crate::repository::MemoryUnitOfWork;

    fn usecase(uow: Arc<MemoryUnitOfWork>) -> TradeUsecase {
        TradeUsecase::new(uow, Arc::new(MemoryLocker::new()), &LockConfig::default())
    }

    #[tokio::test]
    async fn test_rejects_non_positive_amount() {
        let uow = Arc::new(MemoryUnitOfWork::new());
        let trade = usecase(uow.clone());

        let err = trade
            .transfer(TransferCommand {
                from: 1,
                to: 2,
                nonce: 1,
                amount: Money::ZERO,
                auto_confirm: true,
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }

    #[tokio::test]
    async fn test_rejects_same_account() {
        let uow = Arc::new(MemoryUnitOfWork::new());
        let trade = usecase(uow.clone());

        let err = trade
            .transfer(TransferCommand {
                from: 1,
                to: 1,
                nonce: 1,
                amount: Money::from(10),
                auto_confirm: true,
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }

    #[tokio::test]
    async fn test_rejects_non_positive_account_ids() {
        let uow = Arc::new(MemoryUnitOfWork::new());
        let trade = usecase(uow.clone());

        let err = trade
            .cancel(CancelCommand {
                from: 0,
                to: 2,
                nonce: 1,
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }

    #[tokio::test]
    async fn test_auto_confirm_completes_in_one_call() {
        let uow = Arc::new(MemoryUnitOfWork::new());
        uow.seed_account(1, Money::from(1000)).await;
        uow.seed_account(2, Money::from(500)).await;
        let trade = usecase(uow.clone());

        trade
            .transfer(TransferCommand {
                from: 1,
                to: 2,
                nonce: 100,
                amount: Money::from(100),
                auto_confirm: true,
            })
            .await
            .unwrap();

        let source = uow.account(1).await.unwrap();
        let destination = uow.account(2).await.unwrap();
        assert_eq!(source.available_balance, Money::from(900));
        assert_eq!(source.reserved_balance, Money::ZERO);
        assert_eq!(destination.available_balance, Money::from(600));
    }

    #[tokio::test]
    async fn test_auto_confirm_failure_rolls_back_try_as_well() {
        let uow = Arc::new(MemoryUnitOfWork::new());
        uow.seed_account(1, Money::from(1000)).await;
        let trade = usecase(uow.clone());

        // destination account 2 is created inside the transaction before
        // the reserve fails; the rollback must discard it too
        let err = trade
            .transfer(TransferCommand {
                from: 1,
                to: 2,
                nonce: 1,
                amount: Money::from(2000),
                auto_confirm: true,
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientBalance);
        assert!(uow.trade(1, 1).await.is_none());
        assert!(uow.account(2).await.is_none());
    }
}
