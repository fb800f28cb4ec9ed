use anyhow::Result;
use async_trait::async_trait;

use crate::utils::error::ChatError;

/// Text generation backend. Quota, transport, timeout and malformed-body
/// failures all surface as [`ChatError::Generation`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ChatError>;
}

/// Embedding backend used by the semantic index.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}
