pub mod settings;

pub use settings::{
    CacheConfig, EmbeddingConfig, IndexBackend, IndexConfig, LimitsConfig, ProviderConfig,
    ServerConfig, SessionConfig, Settings,
};
