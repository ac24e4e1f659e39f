use crate::domain::{Decimal, Position};

/// Cash value of `quantity` units at `unit_price`, rounded to whole units.
///
/// Returns `None` if the amount does not fit in an `i64`.
pub fn trade_amount(unit_price: Decimal, quantity: i64) -> Option<i64> {
    unit_price
        .checked_mul(Decimal::from_i64(quantity))?
        .round_units()
}

/// Weighted-average cost after adding `quantity` units at `unit_price`.
///
/// An empty position takes the trade price as-is; otherwise the blended cost
/// is rounded to price precision. `None` if the total spent overflows.
pub fn blended_cost(position: &Position, quantity: i64, unit_price: Decimal) -> Option<Decimal> {
    match position.average_cost {
        Some(cost) if position.count > 0 => {
            let held = Decimal::from_i64(position.count);
            let added = Decimal::from_i64(quantity);
            let spent = cost
                .checked_mul(held)?
                .checked_add(unit_price.checked_mul(added)?)?;
            spent
                .checked_div(held.checked_add(added)?)
                .map(|avg| avg.round_price())
        }
        _ => Some(unit_price),
    }
}

/// Position after buying `quantity` units at `unit_price`.
///
/// `None` if the holding count or cost basis would overflow.
pub fn apply_buy(position: &Position, quantity: i64, unit_price: Decimal) -> Option<Position> {
    Some(Position {
        user: position.user.clone(),
        instrument: position.instrument.clone(),
        count: position.count.checked_add(quantity)?,
        average_cost: Some(blended_cost(position, quantity, unit_price)?),
    })
}

/// Position after selling `quantity` units. The cost basis is kept on a
/// partial sale and dropped when the position goes flat.
pub fn apply_sell(position: &Position, quantity: i64) -> Position {
    let count = position.count - quantity;
    Position {
        user: position.user.clone(),
        instrument: position.instrument.clone(),
        count,
        average_cost: if count == 0 {
            None
        } else {
            position.average_cost
        },
    }
}

/// Realized profit of selling `quantity` units for `proceeds`.
pub fn realized_pnl(position: &Position, quantity: i64, proceeds: i64) -> Option<i64> {
    let cost = trade_amount(position.average_cost?, quantity)?;
    Some(proceeds - cost)
}
