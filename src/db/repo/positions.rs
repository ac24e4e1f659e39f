//! Instrument holding operations for the repository.

use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::{decode_decimal, Repository};
use crate::domain::{InstrumentName, Position, UserId};

impl Repository {
    /// Get one position for a user and instrument.
    ///
    /// # Errors
    /// Returns an error if the query fails or a stored cost is malformed.
    pub async fn get_position(
        &self,
        user: &UserId,
        instrument: &InstrumentName,
    ) -> Result<Option<Position>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT user_id, instrument, count, average_cost
            FROM positions
            WHERE user_id = ? AND instrument = ?
            "#,
        )
        .bind(user.as_str())
        .bind(instrument.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(position_from_row).transpose()
    }

    /// All positions held (or once held) by a user, ordered by instrument.
    ///
    /// # Errors
    /// Returns an error if the query fails or a stored cost is malformed.
    pub async fn query_positions(&self, user: &UserId) -> Result<Vec<Position>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, instrument, count, average_cost
            FROM positions
            WHERE user_id = ?
            ORDER BY instrument ASC
            "#,
        )
        .bind(user.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(position_from_row).collect()
    }

    /// Every non-empty position across all users.
    ///
    /// # Errors
    /// Returns an error if the query fails or a stored cost is malformed.
    pub async fn query_open_positions(&self) -> Result<Vec<Position>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, instrument, count, average_cost
            FROM positions
            WHERE count > 0
            ORDER BY user_id ASC, instrument ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(position_from_row).collect()
    }

    /// Insert or overwrite a position.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    pub async fn upsert_position(&self, position: &Position) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO positions (user_id, instrument, count, average_cost)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(user_id, instrument) DO UPDATE SET
                count = excluded.count,
                average_cost = excluded.average_cost
            "#,
        )
        .bind(position.user.as_str())
        .bind(position.instrument.as_str())
        .bind(position.count)
        .bind(position.average_cost.map(|c| c.to_canonical_string()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn position_from_row(row: &SqliteRow) -> Result<Position, sqlx::Error> {
    let average_cost = row
        .get::<Option<String>, _>("average_cost")
        .map(|raw| decode_decimal("average_cost", &raw))
        .transpose()?;

    Ok(Position {
        user: UserId::new(row.get::<String, _>("user_id")),
        instrument: InstrumentName::new(row.get::<String, _>("instrument")),
        count: row.get::<i64, _>("count"),
        average_cost,
    })
}
