use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{EntryMetadata, IndexMatch, SemanticIndex};
use crate::services::provider::EmbeddingProvider;
use crate::utils::error::ChatError;
use crate::utils::similarity::cosine_distance;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexedEntry {
    id: String,
    document: String,
    metadata: EntryMetadata,
    embedding: Vec<f32>,
}

/// In-process vector index with brute-force cosine ranking.
///
/// Writes go through a single writer lock, so duplicate-id checks and the
/// persistence append happen atomically with respect to other writers.
/// Readers only take the `entries` read lock.
pub struct MemoryIndex {
    embedder: Arc<dyn EmbeddingProvider>,
    entries: RwLock<Vec<IndexedEntry>>,
    writer: Mutex<()>,
    persist_path: Option<PathBuf>,
}

impl MemoryIndex {
    /// Volatile index; contents are lost with the process.
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            embedder,
            entries: RwLock::new(Vec::new()),
            writer: Mutex::new(()),
            persist_path: None,
        }
    }

    /// Index backed by a JSON-lines file. Existing lines are loaded; new
    /// entries are appended as they are added.
    pub async fn open(
        embedder: Arc<dyn EmbeddingProvider>,
        path: impl AsRef<Path>,
    ) -> Result<Self, ChatError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                ChatError::IndexUnavailable(format!(
                    "cannot create index directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(text) => Self::parse_lines(&text, &path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(ChatError::IndexUnavailable(format!(
                    "cannot read index file {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        info!(
            "Opened semantic index at {} with {} entries",
            path.display(),
            entries.len()
        );

        Ok(Self {
            embedder,
            entries: RwLock::new(entries),
            writer: Mutex::new(()),
            persist_path: Some(path),
        })
    }

    fn parse_lines(text: &str, path: &Path) -> Vec<IndexedEntry> {
        let mut entries = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<IndexedEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(
                    "Skipping malformed index line {} in {}: {}",
                    lineno + 1,
                    path.display(),
                    e
                ),
            }
        }
        entries
    }

    async fn append_to_file(path: &Path, entry: &IndexedEntry) -> Result<(), ChatError> {
        let mut line = serde_json::to_string(entry)
            .map_err(|e| ChatError::IndexUnavailable(format!("cannot encode entry: {}", e)))?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|e| {
                ChatError::IndexUnavailable(format!("cannot open {}: {}", path.display(), e))
            })?;

        file.write_all(line.as_bytes())
            .await
            .map_err(|e| ChatError::IndexUnavailable(format!("write failed: {}", e)))?;
        file.flush()
            .await
            .map_err(|e| ChatError::IndexUnavailable(format!("flush failed: {}", e)))
    }
}

#[async_trait]
impl SemanticIndex for MemoryIndex {
    async fn add(&self, document: &str, metadata: EntryMetadata, id: &str) -> Result<(), ChatError> {
        let embedding = self
            .embedder
            .embed(document)
            .await
            .map_err(|e| ChatError::IndexUnavailable(format!("embedding failed: {:#}", e)))?;

        let _guard = self.writer.lock().await;

        if self.entries.read().iter().any(|e| e.id == id) {
            return Err(ChatError::IndexUnavailable(format!(
                "duplicate entry id {}",
                id
            )));
        }

        let entry = IndexedEntry {
            id: id.to_string(),
            document: document.to_string(),
            metadata,
            embedding,
        };

        if let Some(path) = &self.persist_path {
            Self::append_to_file(path, &entry).await?;
        }

        self.entries.write().push(entry);
        debug!("Indexed entry {}", id);
        Ok(())
    }

    async fn query(&self, text: &str, k: usize) -> Result<Vec<IndexMatch>, ChatError> {
        if k == 0 || self.entries.read().is_empty() {
            return Ok(Vec::new());
        }

        let query_vector = self
            .embedder
            .embed(text)
            .await
            .map_err(|e| ChatError::IndexUnavailable(format!("embedding failed: {:#}", e)))?;

        let entries = self.entries.read();
        let mut ranked: Vec<(f32, &IndexedEntry)> = entries
            .iter()
            .filter_map(|entry| match cosine_distance(&query_vector, &entry.embedding) {
                Ok(d) => Some((d, entry)),
                Err(e) => {
                    warn!("Skipping entry {} during ranking: {}", entry.id, e);
                    None
                }
            })
            .collect();

        // Stable sort: equal distances keep insertion order.
        ranked.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

        Ok(ranked
            .into_iter()
            .take(k)
            .map(|(distance, entry)| IndexMatch {
                id: entry.id.clone(),
                distance,
                document: entry.document.clone(),
                metadata: entry.metadata.clone(),
            })
            .collect())
    }

    async fn count(&self) -> Result<usize, ChatError> {
        Ok(self.entries.read().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::index::new_entry_id;
    use crate::services::provider::MockEmbeddingProvider;
    use crate::services::test_support::keyword_embedder;
    use std::collections::HashSet;

    fn meta(query: &str) -> EntryMetadata {
        EntryMetadata {
            query: query.to_string(),
        }
    }

    #[tokio::test]
    async fn test_query_ranks_nearest_first() {
        let index = MemoryIndex::new(keyword_embedder());
        index
            .add("Checking accounts have no interest.", meta("checking?"), "a")
            .await
            .unwrap();
        index
            .add("Savings accounts earn interest.", meta("savings?"), "b")
            .await
            .unwrap();

        let hits = index.query("tell me about savings", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "b");
        assert_eq!(hits[0].metadata.query, "savings?");
        assert!(hits[0].distance < hits[1].distance);
        assert!(hits[0].distance.abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_empty_index_skips_embedding() {
        let mut embedder = MockEmbeddingProvider::new();
        embedder.expect_embed().times(0);
        let index = MemoryIndex::new(Arc::new(embedder));

        assert!(index.query("anything", 1).await.unwrap().is_empty());
        assert_eq!(index.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let index = MemoryIndex::new(keyword_embedder());
        index.add("Savings.", meta("q"), "dup").await.unwrap();
        let err = index.add("Checking.", meta("q2"), "dup").await.unwrap_err();
        assert!(matches!(err, ChatError::IndexUnavailable(_)));
        assert_eq!(index.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_embedding_failure_is_index_unavailable() {
        let mut embedder = MockEmbeddingProvider::new();
        embedder
            .expect_embed()
            .returning(|_| Err(anyhow::anyhow!("connection refused")));
        let index = MemoryIndex::new(Arc::new(embedder));

        let err = index.add("doc", meta("q"), "id").await.unwrap_err();
        assert!(matches!(err, ChatError::IndexUnavailable(_)));
        assert_eq!(index.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_persisted_entries_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("responses.jsonl");

        {
            let index = MemoryIndex::open(keyword_embedder(), &path).await.unwrap();
            index
                .add("Savings accounts earn interest.", meta("savings?"), "s1")
                .await
                .unwrap();
        }

        let reopened = MemoryIndex::open(keyword_embedder(), &path).await.unwrap();
        assert_eq!(reopened.count().await.unwrap(), 1);
        let hits = reopened.query("savings", 1).await.unwrap();
        assert_eq!(hits[0].id, "s1");
        assert_eq!(hits[0].document, "Savings accounts earn interest.");
    }

    #[tokio::test]
    async fn test_malformed_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("responses.jsonl");
        let good = serde_json::to_string(&IndexedEntry {
            id: "ok".into(),
            document: "Loans".into(),
            metadata: meta("loan?"),
            embedding: vec![0.0, 0.0, 1.0, 0.1],
        })
        .unwrap();
        tokio::fs::write(&path, format!("{{broken\n{}\n\n", good))
            .await
            .unwrap();

        let index = MemoryIndex::open(keyword_embedder(), &path).await.unwrap();
        assert_eq!(index.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_writers_never_collide() {
        let index = Arc::new(MemoryIndex::new(keyword_embedder()));

        let mut handles = Vec::new();
        for task in 0..2 {
            let index = index.clone();
            handles.push(tokio::spawn(async move {
                let mut ids = Vec::new();
                for i in 0..25 {
                    let id = new_entry_id();
                    index
                        .add(&format!("savings answer {task}-{i}"), meta("q"), &id)
                        .await
                        .unwrap();
                    ids.push(id);
                }
                ids
            }));
        }

        let mut all = HashSet::new();
        for handle in handles {
            for id in handle.await.unwrap() {
                assert!(all.insert(id), "duplicate id stored");
            }
        }
        assert_eq!(index.count().await.unwrap(), 50);
    }
}
