pub mod attendance;
pub mod balances;
pub mod health;
pub mod indexes;
pub mod trades;

use crate::domain::UserId;
use crate::error::AppError;
use crate::services::Exchange;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub exchange: Arc<Exchange>,
}

impl AppState {
    pub fn new(exchange: Arc<Exchange>) -> Self {
        Self { exchange }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/signals", post(indexes::post_signal))
        .route("/v1/activity", post(indexes::post_activity))
        .route("/v1/indexes", get(indexes::list_indexes))
        .route("/v1/indexes/flush", post(indexes::flush_indexes))
        .route("/v1/indexes/:name", get(indexes::get_index))
        .route("/v1/trades", post(trades::post_trade))
        .route("/v1/portfolio/:user", get(trades::get_portfolio))
        .route("/v1/balances/:user", get(balances::get_balance))
        .route("/v1/transfers", post(balances::post_transfer))
        .route("/v1/leaderboard", get(balances::get_leaderboard))
        .route("/v1/circulation", get(balances::get_circulation))
        .route(
            "/v1/attendance/:user",
            get(attendance::get_attendance).post(attendance::post_check_in),
        )
        .route(
            "/v1/leaderboard/attendance",
            get(attendance::get_attendance_leaderboard),
        )
        .layer(cors)
        .with_state(state)
}

pub(crate) fn parse_user(raw: &str) -> Result<UserId, AppError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest("user must not be empty".to_string()));
    }
    Ok(UserId::new(trimmed))
}
