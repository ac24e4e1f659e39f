//! Daily attendance streaks.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::UserId;

/// Which streak an attendance leaderboard ranks by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttendanceRanking {
    #[default]
    Streak,
    MaxStreak,
}

impl AttendanceRanking {
    pub fn score(&self, record: &AttendanceRecord) -> i64 {
        match self {
            AttendanceRanking::Streak => record.streak,
            AttendanceRanking::MaxStreak => record.max_streak,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub user: UserId,
    pub last_day: NaiveDate,
    pub streak: i64,
    pub max_streak: i64,
}

impl AttendanceRecord {
    /// Advance a (possibly missing) record to a check-in on `today`.
    ///
    /// Returns `None` if the user already checked in on or after `today`.
    pub fn check_in(
        previous: Option<&AttendanceRecord>,
        user: &UserId,
        today: NaiveDate,
    ) -> Option<Self> {
        let (streak, max_streak) = match previous {
            None => (1, 0),
            Some(record) => match (today - record.last_day).num_days() {
                days if days <= 0 => return None,
                1 => (record.streak + 1, record.max_streak),
                _ => (1, record.max_streak),
            },
        };

        Some(Self {
            user: user.clone(),
            last_day: today,
            streak,
            max_streak: max_streak.max(streak),
        })
    }
}
