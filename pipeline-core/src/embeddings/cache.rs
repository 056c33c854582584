//! Process-lifetime embedding cache.
//!
//! Unbounded, in-process, shared across stages via the [`Embedder`] they
//! hold. Expected to stay small (rule count plus distinct chunk text), per
//! the shared resource model in the system design.
//!
//! [`Embedder`]: super::Embedder

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use super::Vector;

/// Hit/miss counters for the embedding cache, exposed for the orchestrator's
/// dashboard summary.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Maps raw input text to its embedding vector.
pub struct EmbeddingCache {
    entries: Mutex<HashMap<String, Vector>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Default for EmbeddingCache {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddingCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn get(&self, text: &str) -> Option<Vector> {
        let found = self.entries.lock().get(text).cloned();
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    pub fn put(&self, text: &str, vector: Vector) {
        self.entries.lock().insert(text.to_string(), vector);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn miss_then_hit() {
        let cache = EmbeddingCache::new();
        assert!(cache.get("a").is_none());
        cache.put("a", vec![1.0]);
        assert_eq!(cache.get("a"), Some(vec![1.0]));
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }
}
