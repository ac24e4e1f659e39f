//! Domain types for the franc exchange.
//!
//! This module provides:
//! - Lossless price handling via the Decimal wrapper
//! - Domain primitives: UserId, InstrumentName, Side
//! - Index series and hourly segments
//! - Positions, trade receipts and attendance records

pub mod attendance;
pub mod decimal;
pub mod position;
pub mod primitives;
pub mod series;

pub use attendance::{AttendanceRanking, AttendanceRecord};
pub use decimal::{Decimal, PRICE_DP};
pub use position::{Holding, Position, TradeReceipt};
pub use primitives::{InstrumentName, Side, UserId};
pub use series::{IndexSegment, IndexSeries};

/// A user's currency balance, as listed on the leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    pub user: UserId,
    pub amount: i64,
}
