use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::chat::{ChatMessage, SessionId};
use crate::services::dialog::{DialogState, Slots, WELCOME_MESSAGE};

/// One conversation: dialog position, collected slots and the transcript.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub state: DialogState,
    pub slots: Slots,
    /// Transcript only; never consulted for routing or caching.
    pub history: Vec<ChatMessage>,
    pub created_at: DateTime<Utc>,
    pub last_activity: Instant,
}

impl Session {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            state: DialogState::Idle,
            slots: Slots::new(),
            history: vec![ChatMessage::assistant(WELCOME_MESSAGE)],
            created_at: Utc::now(),
            last_activity: Instant::now(),
        }
    }

    /// "New chat": same id, fresh everything else.
    pub fn reset(&mut self) {
        *self = Self::new(self.id);
    }

    pub fn record_turn(&mut self, user: &str, assistant: &str) {
        self.history.push(ChatMessage::user(user));
        self.history.push(ChatMessage::assistant(assistant));
        self.last_activity = Instant::now();
    }

    pub fn is_expired(&self, idle_timeout: Duration) -> bool {
        self.last_activity.elapsed() > idle_timeout
    }
}

pub type SessionHandle = Arc<Mutex<Session>>;

/// Concurrent session registry.
///
/// Each session sits behind its own async mutex; the turn handler holds it
/// for the whole turn, which serialises messages within a session while
/// different sessions run in parallel.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<DashMap<SessionId, SessionHandle>>,
    idle_timeout: Duration,
}

impl SessionStore {
    pub fn new(idle_timeout: Duration) -> Self {
        info!("Initializing session store (idle timeout {:?})", idle_timeout);
        Self {
            sessions: Arc::new(DashMap::new()),
            idle_timeout,
        }
    }

    /// Existing session for `id`, or a new one (under `id` when given).
    pub fn get_or_create(&self, id: Option<SessionId>) -> (SessionId, SessionHandle) {
        let id = id.unwrap_or_else(Uuid::new_v4);

        if let Some(handle) = self.get(id) {
            return (id, handle);
        }

        let handle = self
            .sessions
            .entry(id)
            .or_insert_with(|| {
                debug!("Created session {}", id);
                Arc::new(Mutex::new(Session::new(id)))
            })
            .clone();
        (id, handle)
    }

    /// Live session for `id`. An idle-expired session is dropped and `None`
    /// returned; a session busy with a turn is never considered expired.
    pub fn get(&self, id: SessionId) -> Option<SessionHandle> {
        let handle = self.sessions.get(&id)?.value().clone();

        let expired = handle
            .try_lock()
            .map(|s| s.is_expired(self.idle_timeout))
            .unwrap_or(false);

        if expired {
            self.sessions.remove(&id);
            debug!("Session {} expired, removed", id);
            return None;
        }

        Some(handle)
    }

    /// Reset `id` to a fresh session, creating it if unknown.
    pub async fn reset(&self, id: SessionId) -> SessionHandle {
        let (_, handle) = self.get_or_create(Some(id));
        handle.lock().await.reset();
        info!("Session {} reset", id);
        handle
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drop idle sessions. Returns how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let before = self.sessions.len();
        let timeout = self.idle_timeout;
        self.sessions.retain(|_, handle| {
            handle
                .try_lock()
                .map(|s| !s.is_expired(timeout))
                .unwrap_or(true)
        });
        let removed = before.saturating_sub(self.sessions.len());

        if removed > 0 {
            info!("Cleaned up {} expired sessions", removed);
        }
        removed
    }
}
