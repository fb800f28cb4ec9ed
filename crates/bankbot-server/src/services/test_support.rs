//! Shared doubles for unit tests.

use std::sync::Arc;

use super::provider::{EmbeddingProvider, MockEmbeddingProvider};

/// Deterministic bag-of-keywords vector: one axis per banking topic plus a
/// constant bias so that unrelated texts still have a non-zero vector.
pub fn keyword_vector(text: &str) -> Vec<f32> {
    let lower = text.to_lowercase();
    let axis = |word: &str| if lower.contains(word) { 1.0 } else { 0.0 };
    vec![axis("savings"), axis("checking"), axis("loan"), 0.1]
}

pub fn keyword_embedder() -> Arc<dyn EmbeddingProvider> {
    let mut embedder = MockEmbeddingProvider::new();
    embedder
        .expect_embed()
        .returning(|text: &str| Ok(keyword_vector(text)));
    Arc::new(embedder)
}
