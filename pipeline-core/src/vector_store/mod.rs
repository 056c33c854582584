//! # Vector Store
//!
//! Typed facade over a remote nearest-neighbor service, exposing exactly the
//! three named collections the pipeline needs: `sessions`, `reflections`,
//! `rules`. One `async_trait` spans every storage operation the rest of the
//! crate needs, with a production implementation ([`qdrant::QdrantStore`],
//! backed by the real `qdrant-client` crate) and an in-memory test double
//! ([`memory::InMemoryStore`]).
//!
//! Payloads are typed per collection (see [`payload`]) and only serialized
//! to untyped JSON at the store boundary.

pub mod memory;
pub mod payload;
#[cfg(feature = "qdrant")]
pub mod qdrant;

pub use payload::{Point, SearchHit};

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

/// A payload filter: an exact-match condition over one or more fields.
/// Kept intentionally small — per the Non-goals, the query language is
/// nearest-neighbor plus payload filters, nothing richer.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    pub equals: HashMap<String, Value>,
    pub gte: HashMap<String, Value>,
    pub lte: HashMap<String, Value>,
}

impl Filter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.equals.insert(field.to_string(), value.into());
        self
    }

    #[must_use]
    pub fn gte(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.gte.insert(field.to_string(), value.into());
        self
    }

    #[must_use]
    pub fn lte(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.lte.insert(field.to_string(), value.into());
        self
    }

    /// Whether `payload` satisfies every condition in this filter. Used by
    /// the in-memory store and by unit tests; the Qdrant implementation
    /// translates the same conditions into a server-side filter instead.
    #[must_use]
    pub fn matches(&self, payload: &HashMap<String, Value>) -> bool {
        self.equals.iter().all(|(k, v)| payload.get(k) == Some(v))
            && self.gte.iter().all(|(k, v)| {
                payload
                    .get(k)
                    .and_then(Value::as_f64)
                    .zip(v.as_f64())
                    .is_some_and(|(a, b)| a >= b)
            })
            && self.lte.iter().all(|(k, v)| {
                payload
                    .get(k)
                    .and_then(Value::as_f64)
                    .zip(v.as_f64())
                    .is_some_and(|(a, b)| a <= b)
            })
    }
}

/// Typed facade over the nearest-neighbor service.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Idempotent collection creation with cosine distance.
    async fn ensure_collection(&self, collection: &str, dim: usize) -> Result<()>;

    /// Insert or overwrite one point.
    async fn upsert(&self, collection: &str, point: Point) -> Result<()>;

    /// Insert or overwrite many points in one call. Implementations batch
    /// internally to stay within a few hundred points per network call.
    async fn upsert_batch(&self, collection: &str, points: Vec<Point>) -> Result<()>;

    /// Nearest-neighbor search, optionally restricted by payload filter.
    /// `score` in the results is cosine similarity in `[-1, 1]`.
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
        filter: Option<&Filter>,
    ) -> Result<Vec<SearchHit>>;

    /// Enumerate all points matching an optional filter. Not guaranteed
    /// stable across pages if the collection mutates concurrently —
    /// reinforcement and scoring scrolls are expected to run during
    /// quiescent periods.
    async fn scroll(&self, collection: &str, filter: Option<&Filter>) -> Result<Vec<Point>>;

    /// Partial payload update for a set of ids.
    async fn set_payload(
        &self,
        collection: &str,
        ids: &[String],
        patch: HashMap<String, Value>,
    ) -> Result<()>;

    /// Delete points by id. Best-effort: callers are expected to tolerate
    /// and log failures rather than treat them as fatal.
    async fn delete(&self, collection: &str, ids: &[String]) -> Result<()>;

    /// Total point count in a collection.
    async fn count(&self, collection: &str) -> Result<usize>;

    /// Stream just the `session_id` payload field across every point in
    /// `sessions`, used by the ingestor to find already-ingested sessions
    /// in a single bulk read.
    async fn list_session_ids(&self) -> Result<std::collections::HashSet<String>> {
        let points = self.scroll(crate::constants::collections::SESSIONS, None).await?;
        Ok(points
            .into_iter()
            .filter_map(|p| {
                p.payload
                    .get("session_id")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .collect())
    }
}

/// Sanitize raw bytes before they become chunk/reflection text: any
/// sequence that doesn't decode as valid UTF-8 (including a lone UTF-16
/// surrogate re-encoded as WTF-8 by an upstream tool) is replaced with
/// U+FFFD. A Rust `String` can never itself hold a lone surrogate, so this
/// is the one place that invariant has to be enforced — at the boundary
/// where untrusted bytes enter the pipeline.
#[must_use]
pub fn sanitize_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
