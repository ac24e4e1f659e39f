use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::{parse_user, AppState};
use crate::domain::{Decimal, UserId};
use crate::error::AppError;

const DEFAULT_LEADERBOARD_LIMIT: usize = 10;
const MAX_LEADERBOARD_LIMIT: usize = 100;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    pub user: UserId,
    pub balance: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub from: String,
    pub to: String,
    pub amount: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferResponse {
    pub from: BalanceResponse,
    pub to: BalanceResponse,
    pub amount: i64,
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub user: UserId,
    pub balance: i64,
}

pub async fn get_balance(
    Path(user): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<BalanceResponse>, AppError> {
    let user = parse_user(&user)?;
    let balance = state.exchange.balance_of(&user).await?;
    Ok(Json(BalanceResponse { user, balance }))
}

pub async fn post_transfer(
    State(state): State<AppState>,
    Json(request): Json<TransferRequest>,
) -> Result<Json<TransferResponse>, AppError> {
    let from = parse_user(&request.from)?;
    let to = parse_user(&request.to)?;

    state.exchange.transfer(&from, &to, request.amount).await?;

    let from_balance = state.exchange.balance_of(&from).await?;
    let to_balance = state.exchange.balance_of(&to).await?;
    Ok(Json(TransferResponse {
        from: BalanceResponse {
            user: from,
            balance: from_balance,
        },
        to: BalanceResponse {
            user: to,
            balance: to_balance,
        },
        amount: request.amount,
    }))
}

pub async fn get_leaderboard(
    Query(params): Query<LeaderboardQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<LeaderboardEntry>>, AppError> {
    let (limit, offset) = page(params.limit, params.offset)?;

    let balances = state.exchange.leaderboard(limit, offset).await?;
    let entries = balances
        .into_iter()
        .enumerate()
        .map(|(i, b)| LeaderboardEntry {
            rank: offset + i + 1,
            user: b.user,
            balance: b.amount,
        })
        .collect();

    Ok(Json(entries))
}

/// Validate leaderboard paging, defaulting to the first page of ten.
pub(crate) fn page(
    limit: Option<usize>,
    offset: Option<usize>,
) -> Result<(usize, usize), AppError> {
    let limit = limit.unwrap_or(DEFAULT_LEADERBOARD_LIMIT);
    if limit == 0 || limit > MAX_LEADERBOARD_LIMIT {
        return Err(AppError::BadRequest(format!(
            "limit must be between 1 and {MAX_LEADERBOARD_LIMIT}"
        )));
    }
    Ok((limit, offset.unwrap_or(0)))
}

pub async fn get_circulation(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let total: Decimal = state.exchange.money_in_circulation().await?;
    Ok(Json(serde_json::json!({ "total": total })))
}
