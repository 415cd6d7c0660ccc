//! points-engine - TCC points transfer service
//!
//! Moves value between ledger accounts with a Try-Confirm-Cancel saga:
//! reserve on the source, then commit to the destination or roll back,
//! with idempotent retries and a transactional outbox.
//!
//! # Modules
//!
//! - [`money`] - Decimal money newtype
//! - [`domain`] - Account aggregate, trade record state machine, events
//! - [`repository`] - Repository/unit-of-work traits, Postgres + in-memory impls
//! - [`lock`] - Per-account-pair lease locks and the renewal coordinator
//! - [`service`] - TCC saga steps and the trade facade
//! - [`gateway`] - Axum HTTP binding
//! - [`config`] / [`logging`] / [`error`] - ambient plumbing

pub mod config;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod lock;
pub mod logging;
pub mod money;
pub mod repository;
pub mod service;

// Convenient re-exports at crate root
pub use config::{AppConfig, LockConfig};
pub use domain::{Account, TccStatus, TradeRecord};
pub use error::{AppError, ErrorKind};
pub use lock::{LockCoordinator, Locker, MemoryLocker, PgLeaseLocker};
pub use money::Money;
pub use repository::{Database, MemoryUnitOfWork, PgUnitOfWork, UnitOfWork};
pub use service::{CancelCommand, ConfirmCommand, TradeUsecase, TransferCommand};
