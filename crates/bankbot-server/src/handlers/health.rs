use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::state::AppState;
use crate::utils::error::ApiError;

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Serialize)]
pub struct ReadinessResponse {
    status: String,
    cached_responses: usize,
    active_sessions: usize,
}

pub async fn health_check() -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// Ready when the semantic index answers. An unreachable index maps to 503
/// even though chat keeps working on the exact tier.
pub async fn readiness_check(
    State(state): State<AppState>,
) -> Result<Json<ReadinessResponse>, ApiError> {
    let cached_responses = state.orchestrator.cache().index_count().await?;

    Ok(Json(ReadinessResponse {
        status: "ready".to_string(),
        cached_responses,
        active_sessions: state.sessions.len(),
    }))
}
