//! Account aggregate
//!
//! Holds an available and a reserved balance; both must stay non-negative
//! at every observable point. All mutations go through `reserve` /
//! `unreserve` in memory plus the matching repository increments inside
//! the owning transaction.

use crate::error::{AppError, ErrorKind};
use crate::money::Money;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct Account {
    pub user_id: i64,
    pub available_balance: Money,
    pub reserved_balance: Money,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a fresh zero-balanced account.
    pub fn open(user_id: i64) -> Self {
        Self {
            user_id,
            available_balance: Money::ZERO,
            reserved_balance: Money::ZERO,
            updated_at: Utc::now(),
        }
    }

    /// Move `amount` from available to reserved.
    ///
    /// Fails with `InsufficientBalance` before any field is touched, so a
    /// rejected reserve leaves the aggregate unchanged.
    pub fn reserve(&mut self, amount: Money) -> Result<(), AppError> {
        if !amount.is_positive() {
            return Err(AppError::new(
                ErrorKind::InvalidRequest,
                "reserve amount must be positive",
            ));
        }
        if self.available_balance < amount {
            return Err(AppError::new(
                ErrorKind::InsufficientBalance,
                "insufficient balance",
            ));
        }

        self.available_balance -= amount;
        self.reserved_balance += amount;

        Ok(())
    }

    /// Release `amount` from the reserved pool.
    ///
    /// A reserved balance smaller than `amount` is an invariant violation
    /// and must abort the enclosing transaction. Where the released amount
    /// is credited (back to this account or to the destination) is decided
    /// by the repository call that follows.
    pub fn unreserve(&mut self, amount: Money) -> Result<(), AppError> {
        if !amount.is_positive() {
            return Err(AppError::new(
                ErrorKind::InvalidRequest,
                "unreserve amount must be positive",
            ));
        }
        if self.reserved_balance < amount {
            return Err(AppError::new(
                ErrorKind::UnreserveBalance,
                "insufficient reserved balance",
            ));
        }

        self.reserved_balance -= amount;

        Ok(())
    }
}
