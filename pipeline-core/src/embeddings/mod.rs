//! # Embedder
//!
//! Deterministic text -> 384-dimensional, L2-normalized vector pipeline,
//! plus cosine similarity and a process-lifetime cache.
//!
//! ## Architecture
//!
//! [`Embedder`] is a trait so the hashing-trick implementation
//! ([`HashingEmbedder`]) can later be swapped for a real sentence-transformer
//! model without touching any call site. [`HashingEmbedder`] uses a
//! feature-hashing bag-of-words over whitespace tokens with mean pooling:
//! deterministic, dependency-free, and — unlike a whole-text hash — gives
//! texts that share vocabulary a genuinely higher cosine similarity, which
//! rule deduplication and the reinforcement scan both depend on.

mod cache;
mod hashing;
mod similarity;

pub use cache::{CacheStats, EmbeddingCache};
pub use similarity::cosine_similarity;

use crate::constants::defaults::EMBEDDING_DIM;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// A 384-dimensional embedding vector.
pub type Vector = Vec<f32>;

/// Deterministic text -> vector pipeline.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single string.
    async fn embed(&self, text: &str) -> Result<Vector>;

    /// Embed a batch of strings. The default implementation embeds
    /// sequentially, preserving cache effectiveness per the concurrency
    /// model (embeddings are computed sequentially, not in parallel, so
    /// repeated text benefits from the cache within the same batch).
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vector>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    /// Dimension of the vectors this embedder produces.
    fn dimension(&self) -> usize {
        EMBEDDING_DIM
    }
}

/// Hashing-trick embedder with an unbounded, process-lifetime cache mapping
/// raw input strings to vectors. Expected to hold a few thousand entries at
/// most (rule count + distinct chunk/session-summary text), per the shared
/// resource model.
pub struct HashingEmbedder {
    cache: EmbeddingCache,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl HashingEmbedder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cache: EmbeddingCache::new(),
        }
    }

    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vector> {
        if let Some(cached) = self.cache.get(text) {
            return Ok(cached);
        }
        if text.is_empty() {
            return Err(Error::Embedding("cannot embed empty text".into()));
        }
        let vector = hashing::embed_hashing_trick(text, EMBEDDING_DIM);
        if vector.len() != EMBEDDING_DIM {
            return Err(Error::Embedding(format!(
                "expected {EMBEDDING_DIM}-dim vector, got {}",
                vector.len()
            )));
        }
        self.cache.put(text, vector.clone());
        Ok(vector)
    }
}

/// Shared, cloneable handle to an [`Embedder`] implementation.
pub type SharedEmbedder = Arc<dyn Embedder>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn produces_384_dim_l2_normalized_vectors() {
        let embedder = HashingEmbedder::new();
        let v = embedder.embed("decided to run tests before committing").await.unwrap();
        assert_eq!(v.len(), 384);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-3, "norm was {norm}");
    }

    #[tokio::test]
    async fn shared_vocabulary_yields_higher_similarity() {
        let embedder = HashingEmbedder::new();
        let a = embedder.embed("always run the test suite before committing").await.unwrap();
        let b = embedder
            .embed("run tests before every commit to catch regressions")
            .await
            .unwrap();
        let c = embedder
            .embed("the weather in Lisbon is mild in autumn")
            .await
            .unwrap();
        let sim_ab = cosine_similarity(&a, &b);
        let sim_ac = cosine_similarity(&a, &c);
        assert!(sim_ab > sim_ac, "{sim_ab} should exceed {sim_ac}");
    }

    #[tokio::test]
    async fn empty_text_is_an_embedding_error() {
        let embedder = HashingEmbedder::new();
        assert!(embedder.embed("").await.is_err());
    }

    #[tokio::test]
    async fn repeated_text_hits_the_cache() {
        let embedder = HashingEmbedder::new();
        let _ = embedder.embed("cache me please").await.unwrap();
        let _ = embedder.embed("cache me please").await.unwrap();
        let stats = embedder.cache_stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }
}
