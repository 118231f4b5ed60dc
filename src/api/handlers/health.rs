use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::{error::AppResult, AppState};

pub async fn liveness() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    match state.users.ping().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ok" }))),
        Err(e) => {
            tracing::warn!("readiness check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "degraded", "db": e.to_string() })),
            )
        }
    }
}

pub async fn ping() -> impl IntoResponse {
    Json(json!({ "message": "pong" }))
}

pub async fn db_time(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let now = state.users.server_time().await?;
    Ok(Json(json!({ "now": now })))
}
