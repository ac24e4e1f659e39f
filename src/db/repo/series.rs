//! Index series operations for the repository.
//!
//! A series is stored as one header row plus one row per hourly segment keyed
//! by `(name, seq)`. Saves rewrite only the tail of the segment list, so the
//! cost of a flush does not grow with the length of the history.

use sqlx::Row;

use super::{decode_decimal, decode_time_ms, Repository};
use crate::domain::{IndexSegment, IndexSeries, InstrumentName};

impl Repository {
    /// Load a full series with its segments in order.
    ///
    /// # Errors
    /// Returns an error if the query fails or a stored value is malformed.
    pub async fn get_series(
        &self,
        name: &InstrumentName,
    ) -> Result<Option<IndexSeries>, sqlx::Error> {
        let header = sqlx::query("SELECT last_updated_at_ms FROM index_series WHERE name = ?")
            .bind(name.as_str())
            .fetch_optional(&self.pool)
            .await?;

        let Some(header) = header else {
            return Ok(None);
        };
        let last_updated_at =
            decode_time_ms("last_updated_at_ms", header.get::<i64, _>("last_updated_at_ms"))?;

        let rows = sqlx::query(
            r#"
            SELECT value, min, max, open_value, started_at_ms, ended_at_ms
            FROM index_segments
            WHERE name = ?
            ORDER BY seq ASC
            "#,
        )
        .bind(name.as_str())
        .fetch_all(&self.pool)
        .await?;

        let segments = rows
            .iter()
            .map(|row| -> Result<IndexSegment, sqlx::Error> {
                Ok(IndexSegment {
                    value: decode_decimal("value", &row.get::<String, _>("value"))?,
                    min: decode_decimal("min", &row.get::<String, _>("min"))?,
                    max: decode_decimal("max", &row.get::<String, _>("max"))?,
                    open_value: decode_decimal("open_value", &row.get::<String, _>("open_value"))?,
                    started_at: row
                        .get::<Option<i64>, _>("started_at_ms")
                        .map(|ms| decode_time_ms("started_at_ms", ms))
                        .transpose()?,
                    ended_at: row
                        .get::<Option<i64>, _>("ended_at_ms")
                        .map(|ms| decode_time_ms("ended_at_ms", ms))
                        .transpose()?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(IndexSeries {
            name: name.clone(),
            last_updated_at,
            segments,
        }))
    }

    /// Names of every stored series, sorted.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn query_series_names(&self) -> Result<Vec<InstrumentName>, sqlx::Error> {
        let rows = sqlx::query("SELECT name FROM index_series ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| InstrumentName::new(row.get::<String, _>("name")))
            .collect())
    }

    /// Persist a series header and its segments from index `from_seq` onward.
    ///
    /// Segments before `from_seq` must already be stored unchanged.
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn save_series(
        &self,
        series: &IndexSeries,
        from_seq: usize,
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO index_series (name, last_updated_at_ms)
            VALUES (?, ?)
            ON CONFLICT(name) DO UPDATE SET
                last_updated_at_ms = excluded.last_updated_at_ms
            "#,
        )
        .bind(series.name.as_str())
        .bind(series.last_updated_at.timestamp_millis())
        .execute(&mut *tx)
        .await?;

        for (seq, segment) in series.segments.iter().enumerate().skip(from_seq) {
            sqlx::query(
                r#"
                INSERT OR REPLACE INTO index_segments
                (name, seq, value, min, max, open_value, started_at_ms, ended_at_ms)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(series.name.as_str())
            .bind(seq as i64)
            .bind(segment.value.to_canonical_string())
            .bind(segment.min.to_canonical_string())
            .bind(segment.max.to_canonical_string())
            .bind(segment.open_value.to_canonical_string())
            .bind(segment.started_at.map(|t| t.timestamp_millis()))
            .bind(segment.ended_at.map(|t| t.timestamp_millis()))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
