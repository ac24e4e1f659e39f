use axum::extract::State;
use axum::Json;

use super::AppState;

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Ready once the exchange is wired; reports index writes not yet durable.
pub async fn ready(State(state): State<AppState>) -> Json<serde_json::Value> {
    let pending = state.exchange.store().dirty_series();
    Json(serde_json::json!({
        "status": "ready",
        "pendingIndexWrites": pending,
    }))
}
