use std::sync::Arc;
use tracing::{debug, info, warn};

use super::exact::{normalize_query, EvictionPolicy, ExactCache};
use crate::services::index::{new_entry_id, EntryMetadata, SemanticIndex};
use crate::utils::error::ChatError;
use crate::utils::similarity::similarity_from_distance;

pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.9;

/// Outcome of [`ResponseCache::lookup`].
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    Exact(String),
    Semantic {
        response: String,
        similarity: f32,
        entry_id: String,
    },
    Miss,
}

impl CacheLookup {
    pub fn response(&self) -> Option<&str> {
        match self {
            CacheLookup::Exact(r) => Some(r),
            CacheLookup::Semantic { response, .. } => Some(response),
            CacheLookup::Miss => None,
        }
    }
}

/// Two-tier response cache: exact match first, then top-1 semantic match.
///
/// A semantic hit at or above the threshold is promoted into the exact tier
/// under the text that was asked, so the same phrasing is an exact hit next
/// time. Nothing is ever removed from the semantic tier.
pub struct ResponseCache {
    exact: ExactCache,
    index: Arc<dyn SemanticIndex>,
    threshold: f32,
}

impl ResponseCache {
    pub fn new(
        index: Arc<dyn SemanticIndex>,
        threshold: f32,
        eviction: EvictionPolicy,
    ) -> Result<Self, ChatError> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ChatError::Config(format!(
                "similarity threshold must be within [0, 1], got {}",
                threshold
            )));
        }

        info!(
            "Response cache ready: threshold={}, exact eviction={:?}",
            threshold, eviction
        );

        Ok(Self {
            exact: ExactCache::new(eviction),
            index,
            threshold,
        })
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub async fn lookup(&self, query: &str) -> CacheLookup {
        if let Some(response) = self.exact.get(query) {
            debug!("Exact cache hit");
            return CacheLookup::Exact(response);
        }

        let candidates = match self.index.query(query, 1).await {
            Ok(c) => c,
            Err(e) => {
                warn!("Semantic lookup failed, treating as miss: {}", e);
                return CacheLookup::Miss;
            }
        };

        let Some(best) = candidates.into_iter().next() else {
            debug!("Semantic index returned no candidates");
            return CacheLookup::Miss;
        };

        let similarity = similarity_from_distance(best.distance);
        if similarity >= self.threshold {
            info!(
                "Semantic cache hit {} (similarity {:.4} >= {})",
                best.id, similarity, self.threshold
            );
            self.exact.insert(query, &best.document);
            return CacheLookup::Semantic {
                response: best.document,
                similarity,
                entry_id: best.id,
            };
        }

        debug!(
            "Best candidate {} below threshold ({:.4} < {})",
            best.id, similarity, self.threshold
        );
        CacheLookup::Miss
    }

    /// Record a confirmed answer in both tiers. Returns the semantic entry id
    /// when the index accepted it; index failures are logged, never raised.
    pub async fn store(&self, query: &str, response: &str) -> Option<String> {
        if normalize_query(query).is_empty() || response.trim().is_empty() {
            warn!("Refusing to cache an empty query or response");
            return None;
        }

        self.exact.insert(query, response);

        let id = new_entry_id();
        let metadata = EntryMetadata {
            query: query.to_string(),
        };

        match self.index.add(response, metadata, &id).await {
            Ok(()) => {
                debug!("Stored response as {}", id);
                Some(id)
            }
            Err(e) => {
                warn!("Semantic store failed, exact tier still updated: {}", e);
                None
            }
        }
    }

    pub fn exact_len(&self) -> usize {
        self.exact.len()
    }

    pub async fn index_count(&self) -> Result<usize, ChatError> {
        self.index.count().await
    }
}
