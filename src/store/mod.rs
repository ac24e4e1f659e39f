//! Caching store in front of a durable persistence backend.
//!
//! This module provides:
//! - A per-kind document cache populated on first load
//! - Write-through saves for balances, positions and attendance
//! - Debounced saves for index series under a configurable flush policy
//! - Per-key async locks shared by the services

pub mod flush;
pub mod locks;
pub mod memory;
pub mod persistence;

pub use flush::{FlushCounter, FlushPolicy};
pub use locks::{KeyGuard, KeyedLocks};
pub use memory::MemoryPersistence;
pub use persistence::Persistence;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use thiserror::Error;

use crate::domain::{
    AttendanceRanking, AttendanceRecord, Balance, IndexSeries, InstrumentName, Position, UserId,
};

/// Errors raised by the store or its backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Cache of the latest known copy of each document of one kind.
#[derive(Debug)]
pub struct DocumentCache<K, V> {
    entries: Mutex<HashMap<K, V>>,
}

impl<K, V> Default for DocumentCache<K, V> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> DocumentCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.lock().get(key).cloned()
    }

    pub fn put(&self, key: K, value: V) {
        self.entries.lock().insert(key, value);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Return the cached copy, or fetch it and cache it when found.
    pub async fn load_with<F, Fut>(&self, key: &K, fetch: F) -> Result<Option<V>, StoreError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<V>, StoreError>>,
    {
        if let Some(value) = self.get(key) {
            return Ok(Some(value));
        }
        let fetched = fetch().await?;
        if let Some(value) = &fetched {
            self.put(key.clone(), value.clone());
        }
        Ok(fetched)
    }

    /// Run the durable write first; cache the value only once it succeeded.
    pub async fn save_with<F, Fut>(&self, key: K, value: V, write: F) -> Result<(), StoreError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), StoreError>>,
    {
        write().await?;
        self.put(key, value);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct SeriesState {
    dirty: HashSet<InstrumentName>,
    /// Segments known to be durable per series.
    persisted_len: HashMap<InstrumentName, usize>,
}

/// The single store object shared by every service.
#[derive(Debug)]
pub struct Store {
    backend: Arc<dyn Persistence>,
    balances: DocumentCache<UserId, i64>,
    positions: DocumentCache<(UserId, InstrumentName), Position>,
    series: DocumentCache<InstrumentName, IndexSeries>,
    attendance: DocumentCache<UserId, AttendanceRecord>,
    series_state: Mutex<SeriesState>,
    series_flush: FlushCounter,
}

impl Store {
    pub fn new(backend: Arc<dyn Persistence>, series_policy: FlushPolicy) -> Self {
        Self {
            backend,
            balances: DocumentCache::default(),
            positions: DocumentCache::default(),
            series: DocumentCache::default(),
            attendance: DocumentCache::default(),
            series_state: Mutex::new(SeriesState::default()),
            series_flush: FlushCounter::new(series_policy),
        }
    }

    /// A store over a fresh in-memory backend.
    pub fn in_memory(series_policy: FlushPolicy) -> Self {
        Self::new(Arc::new(MemoryPersistence::new()), series_policy)
    }

    pub fn series_policy(&self) -> FlushPolicy {
        self.series_flush.policy()
    }

    // -- balances --------------------------------------------------------

    pub async fn load_balance(&self, user: &UserId) -> Result<Option<i64>, StoreError> {
        self.balances
            .load_with(user, || self.backend.load_balance(user))
            .await
    }

    pub async fn save_balance(
        &self,
        user: &UserId,
        amount: i64,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.balances
            .save_with(user.clone(), amount, || {
                self.backend.save_balance(user, amount, at)
            })
            .await
    }

    /// Every stored balance, largest first.
    pub async fn load_balances(&self) -> Result<Vec<Balance>, StoreError> {
        self.backend.load_balances().await
    }

    // -- positions -------------------------------------------------------

    pub async fn load_position(
        &self,
        user: &UserId,
        instrument: &InstrumentName,
    ) -> Result<Option<Position>, StoreError> {
        let key = (user.clone(), instrument.clone());
        self.positions
            .load_with(&key, || self.backend.load_position(user, instrument))
            .await
    }

    pub async fn save_position(&self, position: &Position) -> Result<(), StoreError> {
        let key = (position.user.clone(), position.instrument.clone());
        self.positions
            .save_with(key, position.clone(), || self.backend.save_position(position))
            .await
    }

    pub async fn load_positions(&self, user: &UserId) -> Result<Vec<Position>, StoreError> {
        self.backend.load_positions(user).await
    }

    pub async fn load_open_positions(&self) -> Result<Vec<Position>, StoreError> {
        self.backend.load_open_positions().await
    }

    // -- attendance ------------------------------------------------------

    pub async fn load_attendance(
        &self,
        user: &UserId,
    ) -> Result<Option<AttendanceRecord>, StoreError> {
        self.attendance
            .load_with(user, || self.backend.load_attendance(user))
            .await
    }

    pub async fn save_attendance(&self, record: &AttendanceRecord) -> Result<(), StoreError> {
        self.attendance
            .save_with(record.user.clone(), record.clone(), || {
                self.backend.save_attendance(record)
            })
            .await
    }

    /// Attendance saves are write-through, so the backend ranking is current.
    pub async fn load_attendance_ranking(
        &self,
        ranking: AttendanceRanking,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        self.backend
            .load_attendance_ranking(ranking, limit, offset)
            .await
    }

    // -- index series ----------------------------------------------------

    /// Latest copy of a series, including saves not yet flushed.
    pub async fn load_series(
        &self,
        name: &InstrumentName,
    ) -> Result<Option<IndexSeries>, StoreError> {
        if let Some(series) = self.series.get(name) {
            return Ok(Some(series));
        }
        let Some(series) = self.backend.load_series(name).await? else {
            return Ok(None);
        };
        self.series_state
            .lock()
            .persisted_len
            .insert(name.clone(), series.segments.len());
        self.series.put(name.clone(), series.clone());
        Ok(Some(series))
    }

    /// Record a series update. It becomes durable when the flush policy
    /// says so, or on the next explicit [`Store::flush_series`].
    pub async fn save_series(&self, series: &IndexSeries) -> Result<(), StoreError> {
        self.series.put(series.name.clone(), series.clone());
        self.series_state.lock().dirty.insert(series.name.clone());

        if self.series_flush.register_save() {
            self.flush_series().await?;
        }
        Ok(())
    }

    /// Write every dirty series to the backend. Returns how many were written.
    ///
    /// On failure the unwritten series stay dirty so a later flush retries them.
    pub async fn flush_series(&self) -> Result<usize, StoreError> {
        let pending: Vec<(IndexSeries, usize)> = {
            let mut state = self.series_state.lock();
            let names: Vec<InstrumentName> = state.dirty.drain().collect();
            names
                .into_iter()
                .filter_map(|name| {
                    let persisted = state.persisted_len.get(&name).copied().unwrap_or(0);
                    self.series.get(&name).map(|series| (series, persisted))
                })
                .collect()
        };

        for (i, (series, persisted)) in pending.iter().enumerate() {
            // The live segment may have changed since the last write.
            let from_seq = persisted.saturating_sub(1);
            if let Err(e) = self.backend.save_series(series, from_seq).await {
                tracing::warn!(series = %series.name, error = %e, "series flush failed");
                let mut state = self.series_state.lock();
                for (unwritten, _) in &pending[i..] {
                    state.dirty.insert(unwritten.name.clone());
                }
                return Err(e);
            }
            self.series_state
                .lock()
                .persisted_len
                .insert(series.name.clone(), series.segments.len());
        }

        self.series_flush.reset();
        if !pending.is_empty() {
            tracing::debug!(count = pending.len(), "flushed index series");
        }
        Ok(pending.len())
    }

    /// Number of series with saves not yet durable.
    pub fn dirty_series(&self) -> usize {
        self.series_state.lock().dirty.len()
    }

    /// Names of every known series, durable or cached, sorted.
    pub async fn list_series_names(&self) -> Result<Vec<InstrumentName>, StoreError> {
        let mut names: BTreeSet<InstrumentName> =
            self.backend.load_series_names().await?.into_iter().collect();
        names.extend(self.series.entries.lock().keys().cloned());
        Ok(names.into_iter().collect())
    }
}
