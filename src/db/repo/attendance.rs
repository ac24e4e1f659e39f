//! Attendance record operations for the repository.

use chrono::NaiveDate;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::Repository;
use crate::domain::{AttendanceRanking, AttendanceRecord, UserId};

impl Repository {
    /// Get a user's attendance record.
    ///
    /// # Errors
    /// Returns an error if the query fails or the stored day is malformed.
    pub async fn get_attendance(
        &self,
        user: &UserId,
    ) -> Result<Option<AttendanceRecord>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT user_id, last_day, streak, max_streak FROM attendance WHERE user_id = ?",
        )
        .bind(user.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(decode_attendance).transpose()
    }

    /// One page of attendance records, best first (ties by user id).
    ///
    /// # Errors
    /// Returns an error if the query fails or a stored day is malformed.
    pub async fn query_attendance_ranking(
        &self,
        ranking: AttendanceRanking,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<AttendanceRecord>, sqlx::Error> {
        let sql = match ranking {
            AttendanceRanking::Streak => {
                "SELECT user_id, last_day, streak, max_streak FROM attendance \
                 ORDER BY streak DESC, user_id ASC LIMIT ? OFFSET ?"
            }
            AttendanceRanking::MaxStreak => {
                "SELECT user_id, last_day, streak, max_streak FROM attendance \
                 ORDER BY max_streak DESC, user_id ASC LIMIT ? OFFSET ?"
            }
        };

        let rows = sqlx::query(sql)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .bind(i64::try_from(offset).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(decode_attendance).collect()
    }

    /// Insert or overwrite an attendance record.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    pub async fn upsert_attendance(&self, record: &AttendanceRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO attendance (user_id, last_day, streak, max_streak)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                last_day = excluded.last_day,
                streak = excluded.streak,
                max_streak = excluded.max_streak
            "#,
        )
        .bind(record.user.as_str())
        .bind(record.last_day.format("%Y-%m-%d").to_string())
        .bind(record.streak)
        .bind(record.max_streak)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn decode_attendance(row: &SqliteRow) -> Result<AttendanceRecord, sqlx::Error> {
    let raw_day: String = row.get("last_day");
    let last_day = NaiveDate::parse_from_str(&raw_day, "%Y-%m-%d").map_err(|e| {
        sqlx::Error::ColumnDecode {
            index: "last_day".to_string(),
            source: Box::new(e),
        }
    })?;

    Ok(AttendanceRecord {
        user: UserId::new(row.get::<String, _>("user_id")),
        last_day,
        streak: row.get::<i64, _>("streak"),
        max_streak: row.get::<i64, _>("max_streak"),
    })
}
