use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::domain::{Decimal, IndexSegment, InstrumentName};
use crate::engine::ActivitySnapshot;
use crate::error::AppError;
use crate::services::InstrumentQuote;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalRequest {
    pub instrument: String,
    pub value: Decimal,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalResponse {
    pub instrument: InstrumentName,
    pub applied: Decimal,
    pub clamped: bool,
    pub segments_closed: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexResponse {
    pub name: InstrumentName,
    pub price: Decimal,
    pub last_updated_at: DateTime<Utc>,
    pub segments: Vec<IndexSegment>,
}

pub async fn post_signal(
    State(state): State<AppState>,
    Json(request): Json<SignalRequest>,
) -> Result<Json<SignalResponse>, AppError> {
    let instrument = parse_instrument(&request.instrument)?;
    let outcome = state
        .exchange
        .report_activity_signal(&instrument, request.value)
        .await?;

    Ok(Json(SignalResponse {
        instrument,
        applied: outcome.applied,
        clamped: outcome.clamped,
        segments_closed: outcome.segments_closed,
    }))
}

pub async fn post_activity(
    State(state): State<AppState>,
    Json(snapshot): Json<ActivitySnapshot>,
) -> Result<Json<Vec<InstrumentQuote>>, AppError> {
    let quotes = state.exchange.refresh_indexes(snapshot, Utc::now()).await?;
    Ok(Json(quotes))
}

pub async fn list_indexes(
    State(state): State<AppState>,
) -> Result<Json<Vec<InstrumentQuote>>, AppError> {
    Ok(Json(state.exchange.quotes().await?))
}

pub async fn get_index(
    Path(name): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<IndexResponse>, AppError> {
    let instrument = parse_instrument(&name)?;
    let series = state.exchange.indexes().series(&instrument).await?;
    let price = series
        .current_value()
        .ok_or_else(|| AppError::NotFound(format!("instrument {instrument} has no value")))?;

    Ok(Json(IndexResponse {
        name: series.name,
        price,
        last_updated_at: series.last_updated_at,
        segments: series.segments,
    }))
}

pub async fn flush_indexes(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let flushed = state.exchange.flush_indexes().await?;
    Ok(Json(serde_json::json!({ "flushed": flushed })))
}

fn parse_instrument(raw: &str) -> Result<InstrumentName, AppError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest("instrument must not be empty".to_string()));
    }
    Ok(InstrumentName::new(trimmed.to_ascii_uppercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_instrument_normalizes_case() {
        assert_eq!(
            parse_instrument(" furom ").unwrap(),
            InstrumentName::new("FUROM")
        );
        assert!(matches!(parse_instrument("  "), Err(AppError::BadRequest(_))));
    }
}
