//! The exchange facade: one entry point over every service.

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use super::attendance::{CheckInReceipt, DEFAULT_REWARD_PER_DAY};
use super::{AttendanceBook, EngineError, IndexEngine, Ledger, PositionBook};
use crate::domain::{
    AttendanceRanking, AttendanceRecord, Balance, Decimal, Holding, InstrumentName, Side,
    TradeReceipt, UserId,
};
use crate::engine::signals::{
    cadence_observation, draw_shock, occupancy_observation, random_walk_observation, BASE_VALUE,
};
use crate::engine::{ActivitySnapshot, Instrument, SeriesUpdater, UpdateOutcome, VelocityTracker};
use crate::store::{KeyedLocks, Store};

/// Tunables for an [`Exchange`].
#[derive(Debug, Clone)]
pub struct ExchangeSettings {
    /// Largest fractional index move per elapsed hour.
    pub max_hourly_change: Decimal,
    pub reward_per_day: i64,
    /// Fixed seed for the random-walk index; entropy when `None`.
    pub random_seed: Option<u64>,
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        Self {
            max_hourly_change: Decimal::new(rust_decimal::Decimal::new(1, 2)),
            reward_per_day: DEFAULT_REWARD_PER_DAY,
            random_seed: None,
        }
    }
}

/// A trade order priced at the instrument's current value.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeRequest {
    pub user: UserId,
    pub instrument: InstrumentName,
    pub side: Side,
    /// Required for buys; sells default to the full holding.
    pub quantity: Option<i64>,
}

/// An instrument with its description and live value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentQuote {
    pub name: InstrumentName,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub price: Option<Decimal>,
}

/// A user's cash and valued holdings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Portfolio {
    pub user: UserId,
    pub balance: i64,
    pub holdings: Vec<Holding>,
    /// Balance plus the market value of every priced holding.
    pub total_value: Decimal,
}

#[derive(Debug)]
pub struct Exchange {
    store: Arc<Store>,
    ledger: Ledger,
    positions: PositionBook,
    indexes: IndexEngine,
    attendance: AttendanceBook,
    velocity: Arc<VelocityTracker>,
    rng: Mutex<StdRng>,
}

impl Exchange {
    pub fn new(store: Arc<Store>, settings: ExchangeSettings) -> Self {
        let velocity = Arc::new(VelocityTracker::new());
        let user_locks = Arc::new(KeyedLocks::new());
        let ledger = Ledger::new(store.clone(), user_locks).with_hook(velocity.clone());

        let rng = match settings.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Self {
            positions: PositionBook::new(store.clone(), ledger.clone()),
            indexes: IndexEngine::new(
                store.clone(),
                SeriesUpdater::new(settings.max_hourly_change),
            ),
            attendance: AttendanceBook::new(store.clone(), ledger.clone(), settings.reward_per_day),
            ledger,
            velocity,
            rng: Mutex::new(rng),
            store,
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn positions(&self) -> &PositionBook {
        &self.positions
    }

    pub fn indexes(&self) -> &IndexEngine {
        &self.indexes
    }

    pub fn velocity(&self) -> &VelocityTracker {
        &self.velocity
    }

    /// Feed one raw activity observation to an instrument.
    pub async fn report_activity_signal(
        &self,
        instrument: &InstrumentName,
        raw: Decimal,
    ) -> Result<UpdateOutcome, EngineError> {
        self.indexes.update(instrument, raw).await
    }

    /// Recompute every catalog instrument from community activity at `now`.
    pub async fn refresh_indexes(
        &self,
        snapshot: ActivitySnapshot,
        now: DateTime<Utc>,
    ) -> Result<Vec<InstrumentQuote>, EngineError> {
        let mut quotes = Vec::with_capacity(Instrument::ALL.len());

        for instrument in Instrument::ALL {
            let name = instrument.instrument_name();
            let outcome = match instrument {
                Instrument::Furall => {
                    let observed = occupancy_observation(snapshot.voice_members);
                    self.indexes.update_at(&name, observed, now).await?
                }
                Instrument::Furat => {
                    let idle = snapshot
                        .last_message_at
                        .map(|at| now - at)
                        .unwrap_or_else(TimeDelta::zero);
                    self.indexes
                        .update_at(&name, cadence_observation(idle), now)
                        .await?
                }
                Instrument::Furom => {
                    // The step builds on the live value, so it is drawn under the
                    // instrument lock.
                    self.indexes
                        .update_from_at(&name, now, |current| {
                            let current =
                                current.unwrap_or_else(|| Decimal::from_i64(BASE_VALUE));
                            let shock = draw_shock(&mut *self.rng.lock());
                            random_walk_observation(current, shock)
                        })
                        .await?
                }
                Instrument::Furey => {
                    let observed = cadence_observation(self.velocity.idle(now));
                    self.indexes.update_at(&name, observed, now).await?
                }
            };

            quotes.push(InstrumentQuote {
                name,
                description: Some(instrument.description().to_string()),
                price: Some(outcome.applied),
            });
        }

        tracing::info!(
            voice_members = snapshot.voice_members,
            instruments = quotes.len(),
            "indexes refreshed"
        );
        Ok(quotes)
    }

    /// Execute a trade at the instrument's current price.
    pub async fn request_trade(&self, request: TradeRequest) -> Result<TradeReceipt, EngineError> {
        let price = self.indexes.current_price(&request.instrument).await?;
        match request.side {
            Side::Buy => {
                let quantity = request.quantity.ok_or_else(|| {
                    EngineError::InvalidAmount("buy requires a quantity".to_string())
                })?;
                self.positions
                    .buy(&request.user, &request.instrument, quantity, price)
                    .await
            }
            Side::Sell => {
                self.positions
                    .sell(&request.user, &request.instrument, request.quantity, price)
                    .await
            }
        }
    }

    /// Live value of an instrument, `None` if it was never observed.
    pub async fn current_price(
        &self,
        instrument: &InstrumentName,
    ) -> Result<Option<Decimal>, EngineError> {
        match self.indexes.current_price(instrument).await {
            Ok(price) => Ok(Some(price)),
            Err(EngineError::InstrumentNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Catalog instruments first, then any other observed series.
    pub async fn quotes(&self) -> Result<Vec<InstrumentQuote>, EngineError> {
        let mut listed: HashMap<InstrumentName, Decimal> =
            self.indexes.list().await?.into_iter().collect();

        let mut quotes: Vec<InstrumentQuote> = Instrument::ALL
            .into_iter()
            .map(|instrument| {
                let name = instrument.instrument_name();
                InstrumentQuote {
                    price: listed.remove(&name),
                    description: Some(instrument.description().to_string()),
                    name,
                }
            })
            .collect();

        let mut others: Vec<InstrumentQuote> = listed
            .into_iter()
            .map(|(name, price)| InstrumentQuote {
                name,
                description: None,
                price: Some(price),
            })
            .collect();
        others.sort_by(|a, b| a.name.cmp(&b.name));
        quotes.extend(others);
        Ok(quotes)
    }

    pub async fn balance_of(&self, user: &UserId) -> Result<i64, EngineError> {
        self.ledger.get_balance(user).await
    }

    pub async fn transfer(
        &self,
        from: &UserId,
        to: &UserId,
        amount: i64,
    ) -> Result<(), EngineError> {
        self.ledger.transfer(from, to, amount).await
    }

    pub async fn leaderboard(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Balance>, EngineError> {
        self.ledger.leaderboard(limit, offset).await
    }

    /// Balance and holdings of a user, each holding valued at its live price.
    pub async fn portfolio(&self, user: &UserId) -> Result<Portfolio, EngineError> {
        let balance = self.ledger.get_balance(user).await?;
        let positions: Vec<_> = self
            .positions
            .positions(user)
            .await?
            .into_iter()
            .filter(|p| !p.is_flat())
            .collect();

        let prices = futures::future::try_join_all(
            positions.iter().map(|p| self.current_price(&p.instrument)),
        )
        .await?;

        let holdings = positions
            .iter()
            .zip(prices)
            .map(|(position, price)| {
                Holding::from_position(position, price).ok_or_else(|| {
                    EngineError::InvalidAmount(format!(
                        "value of {user}'s {} overflows",
                        position.instrument
                    ))
                })
            })
            .collect::<Result<Vec<Holding>, EngineError>>()?;

        let total_value = holdings
            .iter()
            .filter_map(|h| h.market_value)
            .try_fold(Decimal::from_i64(balance), |total, value| {
                total.checked_add(value)
            })
            .ok_or_else(|| {
                EngineError::InvalidAmount(format!("portfolio value of {user} overflows"))
            })?
            .round_price();

        Ok(Portfolio {
            user: user.clone(),
            balance,
            holdings,
            total_value,
        })
    }

    /// All balances plus every open position marked at its live price.
    ///
    /// Positions in instruments without a price count as zero.
    pub async fn money_in_circulation(&self) -> Result<Decimal, EngineError> {
        let balances = self.ledger.total_balances().await?;
        let open = self.positions.open_positions().await?;

        let mut prices: HashMap<InstrumentName, Option<Decimal>> = HashMap::new();
        let mut total = Decimal::from_i64(balances);
        for position in &open {
            let price = match prices.get(&position.instrument) {
                Some(price) => *price,
                None => {
                    let price = self.current_price(&position.instrument).await?;
                    prices.insert(position.instrument.clone(), price);
                    price
                }
            };
            if let Some(price) = price {
                total = position
                    .market_value(price)
                    .and_then(|value| total.checked_add(value))
                    .ok_or_else(|| {
                        EngineError::InvalidAmount("money in circulation overflows".to_string())
                    })?;
            }
        }
        Ok(total.round_price())
    }

    pub async fn check_in(&self, user: &UserId) -> Result<CheckInReceipt, EngineError> {
        self.attendance.check_in(user).await
    }

    pub async fn check_in_on(
        &self,
        user: &UserId,
        today: NaiveDate,
    ) -> Result<CheckInReceipt, EngineError> {
        self.attendance.check_in_on(user, today).await
    }

    pub async fn attendance(
        &self,
        user: &UserId,
    ) -> Result<Option<AttendanceRecord>, EngineError> {
        self.attendance.record(user).await
    }

    pub async fn attendance_leaderboard(
        &self,
        ranking: AttendanceRanking,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<AttendanceRecord>, EngineError> {
        self.attendance.leaderboard(ranking, limit, offset).await
    }

    /// Force pending index series to durable storage.
    pub async fn flush_indexes(&self) -> Result<usize, EngineError> {
        self.indexes.flush().await
    }
}
