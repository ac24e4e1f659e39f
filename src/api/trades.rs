use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use super::{parse_user, AppState};
use crate::domain::{InstrumentName, Side, TradeReceipt};
use crate::error::AppError;
use crate::services::{Portfolio, TradeRequest};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeBody {
    pub user: String,
    pub instrument: String,
    pub side: Side,
    pub quantity: Option<i64>,
}

pub async fn post_trade(
    State(state): State<AppState>,
    Json(body): Json<TradeBody>,
) -> Result<Json<TradeReceipt>, AppError> {
    let user = parse_user(&body.user)?;
    let instrument = body.instrument.trim().to_ascii_uppercase();
    if instrument.is_empty() {
        return Err(AppError::BadRequest("instrument must not be empty".to_string()));
    }

    let receipt = state
        .exchange
        .request_trade(TradeRequest {
            user,
            instrument: InstrumentName::new(instrument),
            side: body.side,
            quantity: body.quantity,
        })
        .await?;

    Ok(Json(receipt))
}

pub async fn get_portfolio(
    Path(user): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Portfolio>, AppError> {
    let user = parse_user(&user)?;
    Ok(Json(state.exchange.portfolio(&user).await?))
}
