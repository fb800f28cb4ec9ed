use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::utils::error::ChatError;

/// Environment variable holding the provider API key when it is not set
/// through the `APP__PROVIDER__API_KEY` layer.
pub const API_KEY_ENV: &str = "GOOGLE_API_KEY";

const DEFAULT_CONFIG_PATH: &str = "config/settings";

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct Settings {
    pub server: ServerConfig,
    pub provider: ProviderConfig,
    pub embedding: EmbeddingConfig,
    pub cache: CacheConfig,
    pub index: IndexConfig,
    pub session: SessionConfig,
    pub limits: LimitsConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ProviderConfig {
    #[serde(skip_serializing)]
    pub api_key: String,
    pub base_url: String,
    pub chat_model: String,
    pub timeout_seconds: u64,
    /// Extra attempts after the first failed generation. 0 keeps the
    /// single-shot behaviour.
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://generativelanguage.googleapis.com/v1beta/openai".to_string(),
            chat_model: "gemini-1.5-flash-latest".to_string(),
            timeout_seconds: 60,
            max_retries: 0,
            retry_backoff_ms: 500,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model: String,
    /// Expected vector length; 0 accepts whatever the provider returns.
    pub dimension: usize,
    pub timeout_seconds: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "text-embedding-004".to_string(),
            dimension: 768,
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    pub similarity_threshold: f32,
    /// Cap on exact-tier entries; `None` keeps the tier unbounded.
    pub exact_max_entries: Option<usize>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.9,
            exact_max_entries: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct IndexConfig {
    pub backend: IndexBackend,
    /// JSON-lines file backing the in-process index. Absent = volatile.
    pub persist_path: Option<PathBuf>,
    #[serde(skip_serializing)]
    pub database_url: Option<String>,
    pub pool_max_size: u32,
    pub pool_timeout_seconds: u64,
    /// Upper bound on a single Postgres index statement.
    pub query_timeout_ms: u64,
}

impl IndexConfig {
    /// Persistence file for the in-process index. An empty path counts as
    /// unset, so the index stays volatile.
    pub fn persistence_file(&self) -> Option<&Path> {
        self.persist_path
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms.max(1))
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: IndexBackend::Memory,
            persist_path: None,
            database_url: None,
            pool_max_size: 5,
            pool_timeout_seconds: 10,
            query_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct SessionConfig {
    pub idle_timeout_secs: u64,
    pub cleanup_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 6 * 60 * 60,
            cleanup_interval_secs: 300,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct LimitsConfig {
    pub embedding_concurrency: usize,
    pub generation_concurrency: usize,
    pub acquire_timeout_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            embedding_concurrency: 8,
            generation_concurrency: 4,
            acquire_timeout_ms: 5_000,
        }
    }
}

impl Settings {
    /// Load defaults, then `config/settings.toml` (or `path`), then `APP__*`
    /// environment overrides. Fails when the provider secret is missing.
    pub fn load(path: Option<&Path>) -> Result<Self, ChatError> {
        dotenvy::dotenv().ok();

        let name = path
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

        let config = Config::builder()
            .add_source(File::with_name(&name).required(path.is_some()))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut settings: Settings = config.try_deserialize()?;
        settings.resolve_secret(|key| std::env::var(key).ok());
        settings.validate()?;
        Ok(settings)
    }

    /// Parse settings from TOML text without touching the environment.
    pub fn from_toml(text: &str) -> Result<Self, ChatError> {
        let config = Config::builder()
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// Fill `provider.api_key` from the well-known variable when no layer set it.
    pub fn resolve_secret<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.provider.api_key.trim().is_empty() {
            if let Some(key) = lookup(API_KEY_ENV) {
                self.provider.api_key = key;
            }
        }
    }

    pub fn validate(&self) -> Result<(), ChatError> {
        if self.provider.api_key.trim().is_empty() {
            return Err(ChatError::MissingSecret(API_KEY_ENV.to_string()));
        }

        let threshold = self.cache.similarity_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ChatError::Config(format!(
                "cache.similarity_threshold must be within [0, 1], got {}",
                threshold
            )));
        }

        if self.cache.exact_max_entries == Some(0) {
            return Err(ChatError::Config(
                "cache.exact_max_entries must be at least 1".to_string(),
            ));
        }

        if self.index.backend == IndexBackend::Postgres && self.index.database_url.is_none() {
            return Err(ChatError::Config(
                "index.database_url is required for the postgres backend".to_string(),
            ));
        }

        Ok(())
    }
}
