//! Durable persistence seam behind the store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;

use super::StoreError;
use crate::db::Repository;
use crate::domain::{
    AttendanceRanking, AttendanceRecord, Balance, IndexSeries, InstrumentName, Position, UserId,
};

/// Durable storage for every entity kind the store caches.
///
/// Implementations must make a write durable before returning `Ok`.
#[async_trait]
pub trait Persistence: Send + Sync + fmt::Debug {
    async fn load_balance(&self, user: &UserId) -> Result<Option<i64>, StoreError>;

    async fn save_balance(
        &self,
        user: &UserId,
        amount: i64,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// All balances, largest first (ties by user id).
    async fn load_balances(&self) -> Result<Vec<Balance>, StoreError>;

    async fn load_position(
        &self,
        user: &UserId,
        instrument: &InstrumentName,
    ) -> Result<Option<Position>, StoreError>;

    /// Every position row of a user, including flat ones.
    async fn load_positions(&self, user: &UserId) -> Result<Vec<Position>, StoreError>;

    /// Every non-empty position across all users.
    async fn load_open_positions(&self) -> Result<Vec<Position>, StoreError>;

    async fn save_position(&self, position: &Position) -> Result<(), StoreError>;

    async fn load_series(&self, name: &InstrumentName) -> Result<Option<IndexSeries>, StoreError>;

    async fn load_series_names(&self) -> Result<Vec<InstrumentName>, StoreError>;

    /// Write a series, rewriting segments from `from_seq` onward.
    async fn save_series(&self, series: &IndexSeries, from_seq: usize) -> Result<(), StoreError>;

    async fn load_attendance(&self, user: &UserId)
        -> Result<Option<AttendanceRecord>, StoreError>;

    async fn save_attendance(&self, record: &AttendanceRecord) -> Result<(), StoreError>;

    /// One page of attendance records ordered by `ranking`, ties by user id.
    async fn load_attendance_ranking(
        &self,
        ranking: AttendanceRanking,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<AttendanceRecord>, StoreError>;
}

#[async_trait]
impl Persistence for Repository {
    async fn load_balance(&self, user: &UserId) -> Result<Option<i64>, StoreError> {
        Ok(self.get_balance(user).await?)
    }

    async fn save_balance(
        &self,
        user: &UserId,
        amount: i64,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        Ok(self.upsert_balance(user, amount, at).await?)
    }

    async fn load_balances(&self) -> Result<Vec<Balance>, StoreError> {
        Ok(self.query_balances().await?)
    }

    async fn load_position(
        &self,
        user: &UserId,
        instrument: &InstrumentName,
    ) -> Result<Option<Position>, StoreError> {
        Ok(self.get_position(user, instrument).await?)
    }

    async fn load_positions(&self, user: &UserId) -> Result<Vec<Position>, StoreError> {
        Ok(self.query_positions(user).await?)
    }

    async fn load_open_positions(&self) -> Result<Vec<Position>, StoreError> {
        Ok(self.query_open_positions().await?)
    }

    async fn save_position(&self, position: &Position) -> Result<(), StoreError> {
        Ok(self.upsert_position(position).await?)
    }

    async fn load_series(&self, name: &InstrumentName) -> Result<Option<IndexSeries>, StoreError> {
        Ok(self.get_series(name).await?)
    }

    async fn load_series_names(&self) -> Result<Vec<InstrumentName>, StoreError> {
        Ok(self.query_series_names().await?)
    }

    async fn save_series(&self, series: &IndexSeries, from_seq: usize) -> Result<(), StoreError> {
        Ok(Repository::save_series(self, series, from_seq).await?)
    }

    async fn load_attendance(
        &self,
        user: &UserId,
    ) -> Result<Option<AttendanceRecord>, StoreError> {
        Ok(self.get_attendance(user).await?)
    }

    async fn save_attendance(&self, record: &AttendanceRecord) -> Result<(), StoreError> {
        Ok(self.upsert_attendance(record).await?)
    }

    async fn load_attendance_ranking(
        &self,
        ranking: AttendanceRanking,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        Ok(self.query_attendance_ranking(ranking, limit, offset).await?)
    }
}
