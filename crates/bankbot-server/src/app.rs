use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::{IndexBackend, Settings};
use crate::database::DbPool;
use crate::services::cache::{EvictionPolicy, ResponseCache};
use crate::services::index::{MemoryIndex, PgVectorIndex, SemanticIndex};
use crate::services::provider::{EmbeddingProvider, GenerationProvider};
use crate::services::{GeminiService, RetryPolicy, SessionStore, TurnOrchestrator};
use crate::state::AppState;
use crate::utils::limiters::Limiters;

/// Wire the provider, semantic index and response cache from settings.
/// Any failure here is fatal: nothing is served without a working pipeline.
pub async fn build_orchestrator(settings: &Settings) -> Result<TurnOrchestrator> {
    settings.validate()?;

    let limiters = Arc::new(Limiters::new(&settings.limits));
    let gemini = Arc::new(GeminiService::new(
        settings.provider.clone(),
        settings.embedding.clone(),
        limiters,
    ));
    let embedder: Arc<dyn EmbeddingProvider> = gemini.clone();
    let generator: Arc<dyn GenerationProvider> = gemini;

    let index = build_index(settings, embedder).await?;

    let cache = ResponseCache::new(
        index,
        settings.cache.similarity_threshold,
        EvictionPolicy::from_limit(settings.cache.exact_max_entries),
    )?;

    Ok(TurnOrchestrator::new(
        cache,
        generator,
        RetryPolicy::from_config(&settings.provider),
    ))
}

async fn build_index(
    settings: &Settings,
    embedder: Arc<dyn EmbeddingProvider>,
) -> Result<Arc<dyn SemanticIndex>> {
    let index: Arc<dyn SemanticIndex> = match settings.index.backend {
        IndexBackend::Memory => match settings.index.persistence_file() {
            Some(path) => Arc::new(
                MemoryIndex::open(embedder, path)
                    .await
                    .context("Failed to open semantic index file")?,
            ),
            None => {
                info!("Semantic index is in-memory only");
                Arc::new(MemoryIndex::new(embedder))
            }
        },
        IndexBackend::Postgres => {
            let pool = DbPool::new(&settings.index).await?;
            Arc::new(
                PgVectorIndex::connect(
                    pool,
                    embedder,
                    settings.embedding.dimension,
                    settings.index.query_timeout(),
                )
                .await
                .context("Failed to prepare pgvector table")?,
            )
        }
    };
    Ok(index)
}

pub async fn build_state(settings: &Settings) -> Result<AppState> {
    let orchestrator = build_orchestrator(settings).await?;
    let sessions = SessionStore::new(Duration::from_secs(settings.session.idle_timeout_secs));
    Ok(AppState::new(orchestrator, sessions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::ChatError;

    fn settings(toml: &str) -> Settings {
        let mut settings = Settings::from_toml(toml).unwrap();
        settings.provider.api_key = "test-key".to_string();
        settings
    }

    #[tokio::test]
    async fn test_default_memory_index_is_volatile() {
        let orchestrator = build_orchestrator(&settings("[index]\nbackend = \"memory\""))
            .await
            .unwrap();
        assert_eq!(orchestrator.cache().index_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_empty_persist_path_builds_volatile_index() {
        let empty = settings("[index]\npersist_path = \"\"");
        let orchestrator = build_orchestrator(&empty).await.unwrap();
        assert_eq!(orchestrator.cache().index_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_persist_path_opens_file_backed_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index_data").join("responses.jsonl");
        let persisted = settings(&format!(
            "[index]\npersist_path = {:?}",
            path.to_string_lossy()
        ));
        build_orchestrator(&persisted).await.unwrap();
        assert!(dir.path().join("index_data").is_dir());
    }

    #[tokio::test]
    async fn test_missing_secret_aborts_bootstrap() {
        let settings = Settings::from_toml("").unwrap();
        let err = build_orchestrator(&settings).await.err().unwrap();
        let chat_err = err.downcast_ref::<ChatError>().unwrap();
        assert!(chat_err.is_fatal());
    }
}
