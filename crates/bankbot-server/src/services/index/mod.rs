//! Semantic index: nearest-neighbour store over cached responses.
//!
//! Two backends implement [`SemanticIndex`]:
//! - [`MemoryIndex`]: in-process, optionally appended to a JSON-lines file
//! - [`PgVectorIndex`]: Postgres table with a pgvector column

mod memory;
mod postgres;

pub use memory::MemoryIndex;
pub use postgres::PgVectorIndex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::utils::error::ChatError;

/// Metadata stored next to each document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub query: String,
}

/// One ranked result. Lower distance means closer.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexMatch {
    pub id: String,
    pub distance: f32,
    pub document: String,
    pub metadata: EntryMetadata,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SemanticIndex: Send + Sync {
    /// Store `document` under `id`. Ids must be unique; a duplicate is an error.
    async fn add(&self, document: &str, metadata: EntryMetadata, id: &str) -> Result<(), ChatError>;

    /// Up to `k` entries closest to `text`, nearest first.
    async fn query(&self, text: &str, k: usize) -> Result<Vec<IndexMatch>, ChatError>;

    async fn count(&self) -> Result<usize, ChatError>;
}

/// Mint an entry id. Random, so independent of `count()` and safe across
/// concurrent writers and restarts against a persisted index.
pub fn new_entry_id() -> String {
    format!("response_{}", Uuid::new_v4().simple())
}
