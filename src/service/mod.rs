//! Transfer orchestration: the TCC saga steps and the public facade.

pub mod saga;
pub mod usecase;

pub use saga::TransferSaga;
pub use usecase::{CancelCommand, ConfirmCommand, TradeUsecase, TransferCommand};
