//! Stateful services over the store.
//!
//! This module provides:
//! - The Ledger of currency balances
//! - The Position Book of instrument holdings
//! - The Index Engine of rate-limited price series
//! - Daily attendance rewards
//! - The Exchange facade used by the HTTP layer

pub mod attendance;
pub mod exchange;
pub mod index_engine;
pub mod ledger;
pub mod position_book;

pub use attendance::{AttendanceBook, CheckInReceipt};
pub use exchange::{Exchange, ExchangeSettings, InstrumentQuote, Portfolio, TradeRequest};
pub use index_engine::IndexEngine;
pub use ledger::{BalanceHook, Ledger};
pub use position_book::PositionBook;

use thiserror::Error;

use crate::store::StoreError;

/// Errors returned by engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("insufficient funds: needed {needed}, available {available}")]
    InsufficientFunds { needed: i64, available: i64 },

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("no position: {0}")]
    NoPosition(String),

    #[error("sell quantity {requested} exceeds holdings of {held}")]
    ExceedsHoldings { requested: i64, held: i64 },

    #[error("instrument not found: {0}")]
    InstrumentNotFound(String),

    #[error("already checked in today: {0}")]
    AlreadyCheckedIn(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
