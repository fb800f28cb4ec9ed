pub mod cache;
pub mod dialog;
pub mod gemini;
pub mod index;
pub mod intent;
pub mod orchestrator;
pub mod provider;
pub mod session;

#[cfg(test)]
pub(crate) mod test_support;

pub use cache::ResponseCache;
pub use dialog::{DialogController, DialogState};
pub use gemini::GeminiService;
pub use orchestrator::{ReplySource, RetryPolicy, TurnOrchestrator, TurnReply};
pub use session::{Session, SessionStore};
