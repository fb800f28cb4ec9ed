use axum::extract::FromRef;
use std::sync::Arc;

use crate::services::{SessionStore, TurnOrchestrator};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<TurnOrchestrator>,
    pub sessions: Arc<SessionStore>,
}

impl AppState {
    pub fn new(orchestrator: TurnOrchestrator, sessions: SessionStore) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            sessions: Arc::new(sessions),
        }
    }
}

impl FromRef<AppState> for Arc<SessionStore> {
    fn from_ref(state: &AppState) -> Self {
        state.sessions.clone()
    }
}
