//! In-memory persistence backend.
//!
//! Used by tests and by callers that do not need durability. Writes can be
//! made to fail on demand to exercise error paths above the store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::persistence::Persistence;
use super::StoreError;
use crate::domain::{
    AttendanceRanking, AttendanceRecord, Balance, IndexSeries, InstrumentName, Position, UserId,
};

#[derive(Debug, Default)]
struct Tables {
    balances: HashMap<UserId, i64>,
    positions: BTreeMap<(UserId, InstrumentName), Position>,
    series: BTreeMap<InstrumentName, IndexSeries>,
    attendance: HashMap<UserId, AttendanceRecord>,
}

/// Persistence that keeps everything in process memory.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    tables: Mutex<Tables>,
    fail_writes: AtomicBool,
    series_writes: AtomicUsize,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of series writes that reached this backend.
    pub fn series_writes(&self) -> usize {
        self.series_writes.load(Ordering::SeqCst)
    }

    /// The durable copy of a series, bypassing any cache.
    pub fn stored_series(&self, name: &InstrumentName) -> Option<IndexSeries> {
        self.tables.lock().series.get(name).cloned()
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "memory backend rejecting writes".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Persistence for MemoryPersistence {
    async fn load_balance(&self, user: &UserId) -> Result<Option<i64>, StoreError> {
        Ok(self.tables.lock().balances.get(user).copied())
    }

    async fn save_balance(
        &self,
        user: &UserId,
        amount: i64,
        _at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.check_writable()?;
        if amount < 0 {
            return Err(StoreError::Unavailable(format!(
                "negative balance {amount} for {user}"
            )));
        }
        self.tables.lock().balances.insert(user.clone(), amount);
        Ok(())
    }

    async fn load_balances(&self) -> Result<Vec<Balance>, StoreError> {
        let mut balances: Vec<Balance> = self
            .tables
            .lock()
            .balances
            .iter()
            .map(|(user, amount)| Balance {
                user: user.clone(),
                amount: *amount,
            })
            .collect();
        balances.sort_by(|a, b| b.amount.cmp(&a.amount).then_with(|| a.user.cmp(&b.user)));
        Ok(balances)
    }

    async fn load_position(
        &self,
        user: &UserId,
        instrument: &InstrumentName,
    ) -> Result<Option<Position>, StoreError> {
        let key = (user.clone(), instrument.clone());
        Ok(self.tables.lock().positions.get(&key).cloned())
    }

    async fn load_positions(&self, user: &UserId) -> Result<Vec<Position>, StoreError> {
        Ok(self
            .tables
            .lock()
            .positions
            .values()
            .filter(|p| &p.user == user)
            .cloned()
            .collect())
    }

    async fn load_open_positions(&self) -> Result<Vec<Position>, StoreError> {
        Ok(self
            .tables
            .lock()
            .positions
            .values()
            .filter(|p| p.count > 0)
            .cloned()
            .collect())
    }

    async fn save_position(&self, position: &Position) -> Result<(), StoreError> {
        self.check_writable()?;
        let key = (position.user.clone(), position.instrument.clone());
        self.tables.lock().positions.insert(key, position.clone());
        Ok(())
    }

    async fn load_series(&self, name: &InstrumentName) -> Result<Option<IndexSeries>, StoreError> {
        Ok(self.stored_series(name))
    }

    async fn load_series_names(&self) -> Result<Vec<InstrumentName>, StoreError> {
        Ok(self.tables.lock().series.keys().cloned().collect())
    }

    async fn save_series(&self, series: &IndexSeries, from_seq: usize) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut tables = self.tables.lock();
        let stored = tables
            .series
            .entry(series.name.clone())
            .or_insert_with(|| IndexSeries {
                name: series.name.clone(),
                last_updated_at: series.last_updated_at,
                segments: Vec::new(),
            });

        stored.last_updated_at = series.last_updated_at;
        stored.segments.truncate(from_seq);
        stored
            .segments
            .extend(series.segments.iter().skip(from_seq).cloned());
        self.series_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn load_attendance(
        &self,
        user: &UserId,
    ) -> Result<Option<AttendanceRecord>, StoreError> {
        Ok(self.tables.lock().attendance.get(user).cloned())
    }

    async fn save_attendance(&self, record: &AttendanceRecord) -> Result<(), StoreError> {
        self.check_writable()?;
        self.tables
            .lock()
            .attendance
            .insert(record.user.clone(), record.clone());
        Ok(())
    }

    async fn load_attendance_ranking(
        &self,
        ranking: AttendanceRanking,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        let mut records: Vec<AttendanceRecord> =
            self.tables.lock().attendance.values().cloned().collect();
        records.sort_by(|a, b| {
            ranking
                .score(b)
                .cmp(&ranking.score(a))
                .then_with(|| a.user.cmp(&b.user))
        });
        Ok(records.into_iter().skip(offset).take(limit).collect())
    }
}
