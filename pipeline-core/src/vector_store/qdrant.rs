//! [`VectorStore`] implementation backed by a real Qdrant server via the
//! `qdrant-client` crate.
//!
//! Caller-facing ids are arbitrary strings (`session_id:chunk_index`, rule
//! ids, reflection ids); Qdrant point ids must be a `u64` or a UUID, so this
//! module hashes the string id into a stable `u64` with the same
//! FNV-1a-based non-cryptographic hash used by the embedder
//! (`crate::embeddings::hashing`), and keeps the original string alongside
//! it in the payload under `_point_id` so every read path can recover it.

use async_trait::async_trait;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter as QdrantFilter,
    PointId, PointStruct, PointsIdsList, Range, ScrollPointsBuilder, SearchPointsBuilder,
    SetPayloadPointsBuilder, UpsertPointsBuilder, Value as QdrantValue, VectorParamsBuilder,
    WithPayloadSelector,
};
use qdrant_client::{Payload, Qdrant};
use serde_json::Value;
use std::collections::HashMap;

use super::{Filter, Point, SearchHit, VectorStore};
use crate::error::{Error, Result};

const POINT_ID_KEY: &str = "_point_id";

/// Thin wrapper over a `qdrant_client::Qdrant` handle.
pub struct QdrantStore {
    client: Qdrant,
}

impl QdrantStore {
    /// Connect to a Qdrant instance at `url` (e.g. from `QDRANT_URL`).
    pub fn connect(url: &str) -> Result<Self> {
        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| Error::VectorStore(format!("connecting to qdrant at {url}: {e}")))?;
        Ok(Self { client })
    }
}

fn stable_id(id: &str) -> u64 {
    let mut hash = 0xcbf2_9ce4_8422_2325_u64;
    for &b in id.as_bytes() {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

fn to_qdrant_payload(mut payload: HashMap<String, Value>, original_id: &str) -> Payload {
    payload.insert(POINT_ID_KEY.to_string(), Value::String(original_id.to_string()));
    let json_map: serde_json::Map<String, Value> = payload.into_iter().collect();
    Payload::try_from(Value::Object(json_map)).unwrap_or_else(|_| Payload::new())
}

fn from_qdrant_payload(payload: HashMap<String, QdrantValue>) -> (String, HashMap<String, Value>) {
    let mut out = HashMap::with_capacity(payload.len());
    let mut id = String::new();
    for (k, v) in payload {
        let json_value = qdrant_value_to_json(v);
        if k == POINT_ID_KEY {
            if let Value::String(s) = &json_value {
                id = s.clone();
            }
            continue;
        }
        out.insert(k, json_value);
    }
    (id, out)
}

fn qdrant_value_to_json(value: QdrantValue) -> Value {
    serde_json::to_value(&value).unwrap_or(Value::Null)
}

fn build_filter(filter: &Filter) -> QdrantFilter {
    let mut must = Vec::new();
    for (field, value) in &filter.equals {
        match value {
            Value::String(s) => must.push(Condition::matches(field, s.clone())),
            Value::Bool(b) => must.push(Condition::matches(field, *b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    must.push(Condition::matches(field, i));
                }
            }
            _ => {}
        }
    }
    for (field, value) in &filter.gte {
        if let Some(f) = value.as_f64() {
            must.push(Condition::range(field, Range { gte: Some(f), ..Default::default() }));
        }
    }
    for (field, value) in &filter.lte {
        if let Some(f) = value.as_f64() {
            must.push(Condition::range(field, Range { lte: Some(f), ..Default::default() }));
        }
    }
    QdrantFilter::must(must)
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn ensure_collection(&self, collection: &str, dim: usize) -> Result<()> {
        let exists = self
            .client
            .collection_exists(collection)
            .await
            .map_err(|e| Error::VectorStore(format!("checking collection {collection}: {e}")))?;
        if exists {
            return Ok(());
        }
        self.client
            .create_collection(
                CreateCollectionBuilder::new(collection)
                    .vectors_config(VectorParamsBuilder::new(dim as u64, Distance::Cosine)),
            )
            .await
            .map_err(|e| Error::VectorStore(format!("creating collection {collection}: {e}")))?;
        Ok(())
    }

    async fn upsert(&self, collection: &str, point: Point) -> Result<()> {
        self.upsert_batch(collection, vec![point]).await
    }

    async fn upsert_batch(&self, collection: &str, points: Vec<Point>) -> Result<()> {
        let structs: Vec<PointStruct> = points
            .into_iter()
            .map(|p| {
                let id: PointId = stable_id(&p.id).into();
                let payload = to_qdrant_payload(p.payload, &p.id);
                PointStruct::new(id, p.vector, payload)
            })
            .collect();
        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, structs))
            .await
            .map_err(|e| Error::VectorStore(format!("upserting into {collection}: {e}")))?;
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
        filter: Option<&Filter>,
    ) -> Result<Vec<SearchHit>> {
        let mut builder = SearchPointsBuilder::new(collection, vector.to_vec(), top_k as u64)
            .with_payload(WithPayloadSelector::from(true));
        if let Some(f) = filter {
            builder = builder.filter(build_filter(f));
        }
        let response = self
            .client
            .search_points(builder)
            .await
            .map_err(|e| Error::VectorStore(format!("searching {collection}: {e}")))?;
        Ok(response
            .result
            .into_iter()
            .map(|scored| {
                let (id, payload) = from_qdrant_payload(scored.payload);
                SearchHit {
                    id,
                    score: scored.score,
                    payload,
                }
            })
            .collect())
    }

    async fn scroll(&self, collection: &str, filter: Option<&Filter>) -> Result<Vec<Point>> {
        let mut builder = ScrollPointsBuilder::new(collection)
            .with_payload(WithPayloadSelector::from(true))
            .with_vectors(true)
            .limit(10_000);
        if let Some(f) = filter {
            builder = builder.filter(build_filter(f));
        }
        let response = self
            .client
            .scroll(builder)
            .await
            .map_err(|e| Error::VectorStore(format!("scrolling {collection}: {e}")))?;
        Ok(response
            .result
            .into_iter()
            .map(|p| {
                let (id, payload) = from_qdrant_payload(p.payload);
                let vector = p
                    .vectors
                    .and_then(|v| v.vectors_options)
                    .and_then(|opts| match opts {
                        qdrant_client::qdrant::vectors_output::VectorsOptions::Vector(v) => {
                            Some(v.data)
                        }
                        _ => None,
                    })
                    .unwrap_or_default();
                Point { id, vector, payload }
            })
            .collect())
    }

    async fn set_payload(
        &self,
        collection: &str,
        ids: &[String],
        patch: HashMap<String, Value>,
    ) -> Result<()> {
        let point_ids: Vec<PointId> = ids.iter().map(|id| stable_id(id).into()).collect();
        let json_map: serde_json::Map<String, Value> = patch.into_iter().collect();
        let payload =
            Payload::try_from(Value::Object(json_map)).unwrap_or_else(|_| Payload::new());
        self.client
            .set_payload(
                SetPayloadPointsBuilder::new(collection, payload)
                    .points_selector(PointsIdsList { ids: point_ids }),
            )
            .await
            .map_err(|e| Error::VectorStore(format!("setting payload on {collection}: {e}")))?;
        Ok(())
    }

    async fn delete(&self, collection: &str, ids: &[String]) -> Result<()> {
        let point_ids: Vec<PointId> = ids.iter().map(|id| stable_id(id).into()).collect();
        self.client
            .delete_points(
                DeletePointsBuilder::new(collection)
                    .points(PointsIdsList { ids: point_ids }),
            )
            .await
            .map_err(|e| Error::VectorStore(format!("deleting from {collection}: {e}")))?;
        Ok(())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let response = self
            .client
            .count(qdrant_client::qdrant::CountPointsBuilder::new(collection))
            .await
            .map_err(|e| Error::VectorStore(format!("counting {collection}: {e}")))?;
        Ok(response.result.map_or(0, |r| r.count as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_id_is_deterministic() {
        assert_eq!(stable_id("session-123"), stable_id("session-123"));
    }

    #[test]
    fn stable_id_differs_for_different_inputs() {
        assert_ne!(stable_id("a"), stable_id("b"));
    }
}
