use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::balances::page;
use super::{parse_user, AppState};
use crate::domain::{AttendanceRanking, AttendanceRecord, UserId};
use crate::error::AppError;
use crate::services::CheckInReceipt;

#[derive(Debug, Deserialize)]
pub struct AttendanceLeaderboardQuery {
    /// `streak` (default) or `maxStreak`.
    pub by: Option<AttendanceRanking>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceEntry {
    pub rank: usize,
    pub user: UserId,
    pub streak: i64,
    pub max_streak: i64,
    pub last_day: NaiveDate,
}

pub async fn post_check_in(
    Path(user): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<CheckInReceipt>, AppError> {
    let user = parse_user(&user)?;
    Ok(Json(state.exchange.check_in(&user).await?))
}

pub async fn get_attendance(
    Path(user): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<AttendanceRecord>, AppError> {
    let user = parse_user(&user)?;
    state
        .exchange
        .attendance(&user)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("no attendance record for {user}")))
}

pub async fn get_attendance_leaderboard(
    Query(params): Query<AttendanceLeaderboardQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<AttendanceEntry>>, AppError> {
    let (limit, offset) = page(params.limit, params.offset)?;
    let ranking = params.by.unwrap_or_default();

    let records = state
        .exchange
        .attendance_leaderboard(ranking, limit, offset)
        .await?;
    let entries = records
        .into_iter()
        .enumerate()
        .map(|(i, r)| AttendanceEntry {
            rank: offset + i + 1,
            user: r.user,
            streak: r.streak,
            max_streak: r.max_streak,
            last_day: r.last_day,
        })
        .collect();

    Ok(Json(entries))
}
