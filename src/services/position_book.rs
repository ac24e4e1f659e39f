//! Instrument holdings with weighted-average cost basis.

use std::sync::Arc;

use super::{EngineError, Ledger};
use crate::domain::{Decimal, InstrumentName, Position, Side, TradeReceipt, UserId};
use crate::engine::cost_basis::{apply_buy, apply_sell, realized_pnl, trade_amount};
use crate::store::Store;

/// Buys and sells instrument units against ledger balances.
///
/// Trades lock the trading user through the ledger's lock table, so a trade
/// and a transfer by the same user never interleave.
#[derive(Debug, Clone)]
pub struct PositionBook {
    store: Arc<Store>,
    ledger: Ledger,
}

impl PositionBook {
    pub fn new(store: Arc<Store>, ledger: Ledger) -> Self {
        Self { store, ledger }
    }

    /// A user's position in one instrument; empty if never traded.
    pub async fn position(
        &self,
        user: &UserId,
        instrument: &InstrumentName,
    ) -> Result<Position, EngineError> {
        Ok(self
            .store
            .load_position(user, instrument)
            .await?
            .unwrap_or_else(|| Position::empty(user.clone(), instrument.clone())))
    }

    /// Every position row of a user, flat ones included.
    pub async fn positions(&self, user: &UserId) -> Result<Vec<Position>, EngineError> {
        Ok(self.store.load_positions(user).await?)
    }

    /// Every non-empty position across all users.
    pub async fn open_positions(&self) -> Result<Vec<Position>, EngineError> {
        Ok(self.store.load_open_positions().await?)
    }

    /// Buy `quantity` units at `unit_price`, paying from the user's balance.
    pub async fn buy(
        &self,
        user: &UserId,
        instrument: &InstrumentName,
        quantity: i64,
        unit_price: Decimal,
    ) -> Result<TradeReceipt, EngineError> {
        if quantity <= 0 {
            return Err(EngineError::InvalidAmount(format!(
                "quantity must be positive, got {quantity}"
            )));
        }
        validate_price(unit_price)?;
        let cost = trade_amount(unit_price, quantity)
            .ok_or_else(|| EngineError::InvalidAmount("trade cost overflows".to_string()))?;

        let _guard = self.ledger.locks().lock(user.as_str()).await;

        let available = self.ledger.get_balance(user).await?;
        if available < cost {
            return Err(EngineError::InsufficientFunds {
                needed: cost,
                available,
            });
        }

        let position = self.position(user, instrument).await?;
        let updated = apply_buy(&position, quantity, unit_price)
            .ok_or_else(|| EngineError::InvalidAmount("holding would overflow".to_string()))?;

        let balance = self.ledger.debit_locked(user, cost).await?;
        self.store.save_position(&updated).await?;

        tracing::info!(
            user = %user,
            instrument = %instrument,
            quantity,
            price = %unit_price,
            cost,
            "buy executed"
        );

        Ok(TradeReceipt {
            user: user.clone(),
            instrument: instrument.clone(),
            side: Side::Buy,
            quantity,
            unit_price,
            amount: cost,
            realized_pnl: None,
            position: updated,
            balance,
        })
    }

    /// Sell `quantity` units (all holdings when `None`) at `unit_price`.
    pub async fn sell(
        &self,
        user: &UserId,
        instrument: &InstrumentName,
        quantity: Option<i64>,
        unit_price: Decimal,
    ) -> Result<TradeReceipt, EngineError> {
        if let Some(q) = quantity {
            if q <= 0 {
                return Err(EngineError::InvalidAmount(format!(
                    "quantity must be positive, got {q}"
                )));
            }
        }
        validate_price(unit_price)?;

        let _guard = self.ledger.locks().lock(user.as_str()).await;

        let position = self.position(user, instrument).await?;
        if position.is_flat() {
            return Err(EngineError::NoPosition(format!(
                "{user} holds no {instrument}"
            )));
        }

        let quantity = quantity.unwrap_or(position.count);
        if quantity > position.count {
            return Err(EngineError::ExceedsHoldings {
                requested: quantity,
                held: position.count,
            });
        }

        let proceeds = trade_amount(unit_price, quantity)
            .ok_or_else(|| EngineError::InvalidAmount("trade proceeds overflow".to_string()))?;
        let realized = realized_pnl(&position, quantity, proceeds);
        let updated = apply_sell(&position, quantity);

        self.store.save_position(&updated).await?;
        let balance = self.ledger.credit_locked(user, proceeds).await?;

        tracing::info!(
            user = %user,
            instrument = %instrument,
            quantity,
            price = %unit_price,
            proceeds,
            "sell executed"
        );

        Ok(TradeReceipt {
            user: user.clone(),
            instrument: instrument.clone(),
            side: Side::Sell,
            quantity,
            unit_price,
            amount: proceeds,
            realized_pnl: realized,
            position: updated,
            balance,
        })
    }
}

fn validate_price(unit_price: Decimal) -> Result<(), EngineError> {
    if unit_price.is_positive() {
        Ok(())
    } else {
        Err(EngineError::InvalidAmount(format!(
            "unit price must be positive, got {unit_price}"
        )))
    }
}
