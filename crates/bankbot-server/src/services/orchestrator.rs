use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::ProviderConfig;
use crate::services::cache::{CacheLookup, ResponseCache};
use crate::services::dialog::{DialogController, DialogState};
use crate::services::provider::GenerationProvider;
use crate::services::session::Session;
use crate::utils::error::ChatError;

pub const APOLOGY_MESSAGE: &str =
    "I'm sorry, I'm having trouble generating a response right now. Please try again later.";

/// Which path produced a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplySource {
    Dialog,
    ExactCache,
    SemanticCache,
    Generated,
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TurnReply {
    pub text: String,
    pub source: ReplySource,
    /// Dialog state after the turn.
    pub state: DialogState,
}

/// Bounded retry for generation. `max_retries = 0` means a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &ProviderConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }

    /// Delay before retry number `attempt` (1-based), doubling each time.
    fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.backoff.saturating_mul(factor)
    }
}

/// Routes each message to the dialog, the cache or the generator.
pub struct TurnOrchestrator {
    cache: ResponseCache,
    generator: Arc<dyn GenerationProvider>,
    retry: RetryPolicy,
}

impl TurnOrchestrator {
    pub fn new(
        cache: ResponseCache,
        generator: Arc<dyn GenerationProvider>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            cache,
            generator,
            retry,
        }
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Process one user message against `session`.
    ///
    /// An active dialog (or an open-account request from IDLE) consumes the
    /// message without touching the cache. Everything else is a query:
    /// cache lookup, then generation on a miss. Only successful generations
    /// are stored. Both turns are appended to the transcript in every case.
    pub async fn handle_turn(&self, session: &mut Session, message: &str) -> TurnReply {
        let reply = match DialogController::advance(session.state, &session.slots, message) {
            Some(transition) => {
                debug!(
                    "Session {} dialog {} -> {}",
                    session.id, session.state, transition.state
                );
                session.state = transition.state;
                session.slots = transition.slots;
                TurnReply {
                    text: transition.reply,
                    source: ReplySource::Dialog,
                    state: session.state,
                }
            }
            None => self.answer_query(session.state, message).await,
        };

        session.record_turn(message, &reply.text);
        reply
    }

    async fn answer_query(&self, state: DialogState, query: &str) -> TurnReply {
        let reply = |text: String, source: ReplySource| TurnReply {
            text,
            source,
            state,
        };

        match self.cache.lookup(query).await {
            CacheLookup::Exact(response) => return reply(response, ReplySource::ExactCache),
            CacheLookup::Semantic { response, .. } => {
                return reply(response, ReplySource::SemanticCache)
            }
            CacheLookup::Miss => {}
        }

        match self.generate_with_retry(query).await {
            Ok(response) => {
                self.cache.store(query, &response).await;
                reply(response, ReplySource::Generated)
            }
            Err(e) => {
                error!("Generation failed, replying with apology: {}", e);
                reply(APOLOGY_MESSAGE.to_string(), ReplySource::Fallback)
            }
        }
    }

    async fn generate_with_retry(&self, prompt: &str) -> Result<String, ChatError> {
        let mut attempt = 0;
        loop {
            match self.generator.generate(prompt).await {
                Ok(text) => {
                    if attempt > 0 {
                        info!("Generation succeeded after {} retries", attempt);
                    }
                    return Ok(text);
                }
                Err(e) if attempt < self.retry.max_retries => {
                    attempt += 1;
                    let delay = self.retry.delay(attempt);
                    warn!(
                        "Generation attempt {} failed ({}), retrying in {:?}",
                        attempt, e, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
