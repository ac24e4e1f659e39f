//! Per-user instrument holdings and trade receipts.

use serde::{Deserialize, Serialize};

use super::{Decimal, InstrumentName, Side, UserId};

/// A user's holding of one instrument.
///
/// `average_cost` is `None` exactly when `count == 0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub user: UserId,
    pub instrument: InstrumentName,
    pub count: i64,
    pub average_cost: Option<Decimal>,
}

impl Position {
    /// An empty position, as created before the first buy.
    pub fn empty(user: UserId, instrument: InstrumentName) -> Self {
        Self {
            user,
            instrument,
            count: 0,
            average_cost: None,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.count == 0
    }

    /// Mark-to-market value at `price`; `None` on overflow.
    pub fn market_value(&self, price: Decimal) -> Option<Decimal> {
        Decimal::from_i64(self.count).checked_mul(price)
    }

    /// Unrealized P&L in percent of the cost basis at `price`.
    pub fn unrealized_pnl_pct(&self, price: Decimal) -> Option<Decimal> {
        let cost = self.average_cost?;
        if cost.is_zero() {
            return None;
        }
        (price - cost)
            .checked_div(cost)?
            .checked_mul(Decimal::hundred())
    }
}

/// Outcome of an executed trade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeReceipt {
    pub user: UserId,
    pub instrument: InstrumentName,
    pub side: Side,
    pub quantity: i64,
    pub unit_price: Decimal,
    /// Cash moved by the trade: cost on buy, proceeds on sell.
    pub amount: i64,
    /// Realized profit on sells; `None` on buys.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub realized_pnl: Option<i64>,
    pub position: Position,
    pub balance: i64,
}

/// A position valued at the current price, for portfolio display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Holding {
    pub instrument: InstrumentName,
    pub count: i64,
    pub average_cost: Option<Decimal>,
    /// `None` when the instrument is no longer listed.
    pub current_price: Option<Decimal>,
    pub market_value: Option<Decimal>,
    pub unrealized_pnl_pct: Option<Decimal>,
}

impl Holding {
    /// Value `position` at `current_price`.
    ///
    /// Returns `None` if the market value does not fit the decimal range.
    pub fn from_position(position: &Position, current_price: Option<Decimal>) -> Option<Self> {
        let market_value = match current_price {
            Some(price) => Some(position.market_value(price)?),
            None => None,
        };
        Some(Self {
            instrument: position.instrument.clone(),
            count: position.count,
            average_cost: position.average_cost,
            current_price,
            market_value,
            unrealized_pnl_pct: current_price
                .and_then(|p| position.unrealized_pnl_pct(p))
                .map(|pct| pct.round_dp(2)),
        })
    }
}
