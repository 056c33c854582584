//! In-memory [`VectorStore`] implementation.
//!
//! A `tokio::sync::RwLock`-guarded map, used both as a test double for
//! `pipeline-core`'s own test suite and as the default backend for
//! `pipeline-cli` when no `QDRANT_URL` is configured, so the pipeline
//! always has somewhere to write.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{Filter, Point, SearchHit, VectorStore};
use crate::embeddings::cosine_similarity;
use crate::error::{Error, Result};

#[derive(Default)]
struct Collection {
    points: HashMap<String, Point>,
}

/// Single-process, in-memory vector store.
#[derive(Default)]
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn ensure_collection(&self, collection: &str, _dim: usize) -> Result<()> {
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default();
        Ok(())
    }

    async fn upsert(&self, collection: &str, point: Point) -> Result<()> {
        let mut guard = self.collections.write().await;
        let coll = guard.entry(collection.to_string()).or_default();
        coll.points.insert(point.id.clone(), point);
        Ok(())
    }

    async fn upsert_batch(&self, collection: &str, points: Vec<Point>) -> Result<()> {
        let mut guard = self.collections.write().await;
        let coll = guard.entry(collection.to_string()).or_default();
        for point in points {
            coll.points.insert(point.id.clone(), point);
        }
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
        filter: Option<&Filter>,
    ) -> Result<Vec<SearchHit>> {
        let guard = self.collections.read().await;
        let Some(coll) = guard.get(collection) else {
            return Ok(Vec::new());
        };
        let mut hits: Vec<SearchHit> = coll
            .points
            .values()
            .filter(|p| filter.is_none_or(|f| f.matches(&p.payload)))
            .map(|p| SearchHit {
                id: p.id.clone(),
                score: cosine_similarity(vector, &p.vector),
                payload: p.payload.clone(),
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn scroll(&self, collection: &str, filter: Option<&Filter>) -> Result<Vec<Point>> {
        let guard = self.collections.read().await;
        let Some(coll) = guard.get(collection) else {
            return Ok(Vec::new());
        };
        Ok(coll
            .points
            .values()
            .filter(|p| filter.is_none_or(|f| f.matches(&p.payload)))
            .cloned()
            .collect())
    }

    async fn set_payload(
        &self,
        collection: &str,
        ids: &[String],
        patch: HashMap<String, Value>,
    ) -> Result<()> {
        let mut guard = self.collections.write().await;
        let Some(coll) = guard.get_mut(collection) else {
            return Err(Error::VectorStore(format!("unknown collection {collection}")));
        };
        for id in ids {
            if let Some(point) = coll.points.get_mut(id) {
                for (k, v) in &patch {
                    point.payload.insert(k.clone(), v.clone());
                }
            }
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, ids: &[String]) -> Result<()> {
        let mut guard = self.collections.write().await;
        if let Some(coll) = guard.get_mut(collection) {
            for id in ids {
                coll.points.remove(id);
            }
        }
        Ok(())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let guard = self.collections.read().await;
        Ok(guard.get(collection).map_or(0, |c| c.points.len()))
    }
}
