use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::models::chat::*;
use crate::services::dialog::WELCOME_MESSAGE;
use crate::services::SessionStore;
use crate::state::AppState;
use crate::utils::error::ApiError;

pub async fn chat_handler(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    if request.message.trim().is_empty() {
        return Err(ApiError::BadRequest("message must not be empty".to_string()));
    }

    let start_time = Instant::now();
    let (session_id, handle) = state.sessions.get_or_create(request.session_id);

    // Held for the whole turn: one message per session at a time.
    let mut session = handle.lock().await;
    let reply = state
        .orchestrator
        .handle_turn(&mut session, &request.message)
        .await;

    info!(
        "Chat turn: session={}, source={:?}, state={}, took={}ms",
        session_id,
        reply.source,
        reply.state,
        start_time.elapsed().as_millis()
    );

    Ok(Json(ChatResponse {
        session_id,
        response: reply.text,
        state: reply.state,
        source: reply.source,
    }))
}

pub async fn reset_handler(
    State(sessions): State<Arc<SessionStore>>,
    Path(session_id): Path<SessionId>,
) -> Json<ResetResponse> {
    sessions.reset(session_id).await;

    Json(ResetResponse {
        session_id,
        response: WELCOME_MESSAGE.to_string(),
    })
}

pub async fn history_handler(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let handle = state
        .sessions
        .get(session_id)
        .ok_or_else(|| ApiError::NotFound(format!("session {}", session_id)))?;

    let session = handle.lock().await;
    Ok(Json(HistoryResponse {
        session_id,
        state: session.state,
        slots: session.slots.clone(),
        created_at: session.created_at,
        messages: session.history.clone(),
    }))
}
