//! Rate-limited, hourly segmented index series.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::EngineError;
use crate::domain::{Decimal, IndexSeries, InstrumentName};
use crate::engine::{SeriesUpdater, UpdateOutcome};
use crate::store::{KeyedLocks, Store};

/// Turns raw activity observations into instrument prices.
#[derive(Debug)]
pub struct IndexEngine {
    store: Arc<Store>,
    locks: KeyedLocks,
    updater: SeriesUpdater,
}

impl IndexEngine {
    pub fn new(store: Arc<Store>, updater: SeriesUpdater) -> Self {
        Self {
            store,
            locks: KeyedLocks::new(),
            updater,
        }
    }

    /// Apply an observation at the current time.
    pub async fn update(
        &self,
        name: &InstrumentName,
        observed: Decimal,
    ) -> Result<UpdateOutcome, EngineError> {
        self.update_at(name, observed, Utc::now()).await
    }

    /// Apply an observation as of `now`.
    ///
    /// The first observation of an instrument creates its series verbatim.
    /// Later observations are clamped to the hourly rate limit, and the
    /// series is cut into hourly segments up to `now` before recording.
    pub async fn update_at(
        &self,
        name: &InstrumentName,
        observed: Decimal,
        now: DateTime<Utc>,
    ) -> Result<UpdateOutcome, EngineError> {
        self.update_from_at(name, now, |_| observed).await
    }

    /// Apply an observation derived from the instrument's live value.
    ///
    /// `observe` receives the current value (`None` before the first
    /// observation) and runs under the instrument lock, so concurrent
    /// callers each build on the previous result.
    pub async fn update_from_at<F>(
        &self,
        name: &InstrumentName,
        now: DateTime<Utc>,
        observe: F,
    ) -> Result<UpdateOutcome, EngineError>
    where
        F: FnOnce(Option<Decimal>) -> Decimal,
    {
        if name.as_str().is_empty() {
            return Err(EngineError::InvalidAmount(
                "instrument name must not be empty".to_string(),
            ));
        }

        let _guard = self.locks.lock(name.as_str()).await;

        let existing = self.store.load_series(name).await?;
        let observed = observe(existing.as_ref().and_then(|s| s.current_value()));
        if !observed.round_price().is_positive() {
            return Err(EngineError::InvalidAmount(format!(
                "observation for {name} must be positive, got {observed}"
            )));
        }

        let Some(mut series) = existing else {
            let series = IndexSeries::new(name.clone(), observed.round_price(), now);
            let applied = series.current_value().unwrap_or(observed);
            self.store.save_series(&series).await?;
            tracing::info!(instrument = %name, value = %applied, "index series created");
            return Ok(UpdateOutcome {
                applied,
                clamped: false,
                segments_closed: 0,
            });
        };

        let outcome = self.updater.apply(&mut series, observed, now);
        self.store.save_series(&series).await?;

        if outcome.clamped {
            tracing::debug!(
                instrument = %name,
                observed = %observed,
                applied = %outcome.applied,
                "observation clamped by rate limit"
            );
        }
        if outcome.segments_closed > 0 {
            tracing::debug!(
                instrument = %name,
                closed = outcome.segments_closed,
                "hourly segments closed"
            );
        }

        Ok(outcome)
    }

    /// Live value of an instrument.
    pub async fn current_price(&self, name: &InstrumentName) -> Result<Decimal, EngineError> {
        self.store
            .load_series(name)
            .await?
            .and_then(|series| series.current_value())
            .ok_or_else(|| EngineError::InstrumentNotFound(name.to_string()))
    }

    /// Full history of an instrument.
    pub async fn series(&self, name: &InstrumentName) -> Result<IndexSeries, EngineError> {
        self.store
            .load_series(name)
            .await?
            .ok_or_else(|| EngineError::InstrumentNotFound(name.to_string()))
    }

    /// Every observed instrument with its live value, sorted by name.
    pub async fn list(&self) -> Result<Vec<(InstrumentName, Decimal)>, EngineError> {
        let mut quotes = Vec::new();
        for name in self.store.list_series_names().await? {
            if let Some(value) = self
                .store
                .load_series(&name)
                .await?
                .and_then(|s| s.current_value())
            {
                quotes.push((name, value));
            }
        }
        Ok(quotes)
    }

    /// Force all pending series writes to durable storage.
    pub async fn flush(&self) -> Result<usize, EngineError> {
        Ok(self.store.flush_series().await?)
    }
}
