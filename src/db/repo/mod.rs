//! Repository layer for database operations.
//!
//! This module provides the `Repository` struct for all database operations.
//! Methods are organized across submodules by domain:
//! - `positions.rs` - Instrument holdings
//! - `series.rs` - Index series and their hourly segments
//! - `attendance.rs` - Daily check-in records

mod attendance;
mod positions;
mod series;

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use std::str::FromStr;

use crate::domain::{Balance, Decimal, UserId};

/// Repository for database operations.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    // =========================================================================
    // Balance operations
    // =========================================================================

    /// Get the stored balance for a user, if any.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get_balance(&self, user: &UserId) -> Result<Option<i64>, sqlx::Error> {
        let row = sqlx::query("SELECT amount FROM balances WHERE user_id = ?")
            .bind(user.as_str())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.get::<i64, _>("amount")))
    }

    /// Insert or overwrite a user's balance.
    ///
    /// # Errors
    /// Returns an error if the write fails (including a negative amount,
    /// which the schema rejects).
    pub async fn upsert_balance(
        &self,
        user: &UserId,
        amount: i64,
        at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO balances (user_id, amount, updated_at_ms)
            VALUES (?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                amount = excluded.amount,
                updated_at_ms = excluded.updated_at_ms
            "#,
        )
        .bind(user.as_str())
        .bind(amount)
        .bind(at.timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// All balances, largest first (ties by user id).
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn query_balances(&self) -> Result<Vec<Balance>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT user_id, amount FROM balances ORDER BY amount DESC, user_id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| Balance {
                user: UserId::new(row.get::<String, _>("user_id")),
                amount: row.get::<i64, _>("amount"),
            })
            .collect())
    }
}

/// Parse a decimal column, surfacing corruption as a decode error.
fn decode_decimal(column: &str, raw: &str) -> Result<Decimal, sqlx::Error> {
    Decimal::from_str(raw).map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

/// Convert a stored millisecond timestamp back into a UTC time.
fn decode_time_ms(column: &str, ms: i64) -> Result<DateTime<Utc>, sqlx::Error> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: format!("timestamp out of range: {}", ms).into(),
    })
}
