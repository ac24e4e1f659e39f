//! Daily check-in rewards paid through the ledger.

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;

use super::{EngineError, Ledger};
use crate::domain::{AttendanceRanking, AttendanceRecord, UserId};
use crate::store::Store;

/// Default reward per streak day.
pub const DEFAULT_REWARD_PER_DAY: i64 = 100;

/// Outcome of a successful check-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInReceipt {
    pub record: AttendanceRecord,
    pub reward: i64,
    pub balance: i64,
}

#[derive(Debug, Clone)]
pub struct AttendanceBook {
    store: Arc<Store>,
    ledger: Ledger,
    reward_per_day: i64,
}

impl AttendanceBook {
    pub fn new(store: Arc<Store>, ledger: Ledger, reward_per_day: i64) -> Self {
        Self {
            store,
            ledger,
            reward_per_day,
        }
    }

    /// A user's attendance record, `None` before the first check-in.
    pub async fn record(&self, user: &UserId) -> Result<Option<AttendanceRecord>, EngineError> {
        Ok(self.store.load_attendance(user).await?)
    }

    /// Attendance records ranked by current or best streak, paginated.
    pub async fn leaderboard(
        &self,
        ranking: AttendanceRanking,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<AttendanceRecord>, EngineError> {
        Ok(self
            .store
            .load_attendance_ranking(ranking, limit, offset)
            .await?)
    }

    /// Check in for the current UTC day.
    pub async fn check_in(&self, user: &UserId) -> Result<CheckInReceipt, EngineError> {
        self.check_in_on(user, Utc::now().date_naive()).await
    }

    /// Check in for `today`, crediting `streak × reward_per_day`.
    pub async fn check_in_on(
        &self,
        user: &UserId,
        today: NaiveDate,
    ) -> Result<CheckInReceipt, EngineError> {
        let _guard = self.ledger.locks().lock(user.as_str()).await;

        let previous = self.store.load_attendance(user).await?;
        let record = AttendanceRecord::check_in(previous.as_ref(), user, today)
            .ok_or_else(|| EngineError::AlreadyCheckedIn(user.to_string()))?;
        let reward = record
            .streak
            .checked_mul(self.reward_per_day)
            .ok_or_else(|| EngineError::InvalidAmount("attendance reward overflows".to_string()))?;

        self.store.save_attendance(&record).await?;
        let balance = self.ledger.credit_locked(user, reward).await?;

        tracing::info!(user = %user, streak = record.streak, reward, "attendance checked in");
        Ok(CheckInReceipt {
            record,
            reward,
            balance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FlushPolicy, KeyedLocks};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, d).unwrap()
    }

    fn book() -> AttendanceBook {
        let store = Arc::new(Store::in_memory(FlushPolicy::Immediate));
        let ledger = Ledger::new(store.clone(), Arc::new(KeyedLocks::new()));
        AttendanceBook::new(store, ledger, DEFAULT_REWARD_PER_DAY)
    }

    #[tokio::test]
    async fn test_consecutive_days_grow_reward() {
        let book = book();
        let user = UserId::new("u1");

        let first = book.check_in_on(&user, day(1)).await.unwrap();
        assert_eq!(first.reward, 100);
        assert_eq!(first.balance, 100);

        let second = book.check_in_on(&user, day(2)).await.unwrap();
        assert_eq!(second.record.streak, 2);
        assert_eq!(second.reward, 200);
        assert_eq!(second.balance, 300);
    }

    #[tokio::test]
    async fn test_same_day_is_rejected() {
        let book = book();
        let user = UserId::new("u1");
        book.check_in_on(&user, day(1)).await.unwrap();

        let err = book.check_in_on(&user, day(1)).await.unwrap_err();
        assert!(matches!(err, EngineError::AlreadyCheckedIn(_)));
        assert_eq!(book.ledger.get_balance(&user).await.unwrap(), 100);
    }

    #[tokio::test]
    async fn test_gap_resets_streak_but_keeps_best() {
        let book = book();
        let user = UserId::new("u1");
        book.check_in_on(&user, day(1)).await.unwrap();
        book.check_in_on(&user, day(2)).await.unwrap();

        let after_gap = book.check_in_on(&user, day(5)).await.unwrap();
        assert_eq!(after_gap.record.streak, 1);
        assert_eq!(after_gap.record.max_streak, 2);
        assert_eq!(after_gap.reward, 100);
    }

    #[tokio::test]
    async fn test_record_lookup() {
        let book = book();
        let user = UserId::new("u1");
        assert_eq!(book.record(&user).await.unwrap(), None);

        book.check_in_on(&user, day(3)).await.unwrap();
        let record = book.record(&user).await.unwrap().unwrap();
        assert_eq!(record.last_day, day(3));
        assert_eq!(record.streak, 1);
    }

    #[tokio::test]
    async fn test_leaderboards_rank_current_and_best_streak() {
        let book = book();
        let steady = UserId::new("steady");
        let lapsed = UserId::new("lapsed");

        for d in 1..=3 {
            book.check_in_on(&steady, day(d)).await.unwrap();
        }
        for d in 1..=5 {
            book.check_in_on(&lapsed, day(d)).await.unwrap();
        }
        book.check_in_on(&lapsed, day(9)).await.unwrap();

        let current = book
            .leaderboard(AttendanceRanking::Streak, 10, 0)
            .await
            .unwrap();
        assert_eq!(current[0].user, steady);
        assert_eq!(current[1].user, lapsed);

        let best = book
            .leaderboard(AttendanceRanking::MaxStreak, 10, 0)
            .await
            .unwrap();
        assert_eq!(best[0].user, lapsed);
        assert_eq!(best[0].max_streak, 5);

        let page = book
            .leaderboard(AttendanceRanking::MaxStreak, 1, 1)
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].user, steady);
    }
}
