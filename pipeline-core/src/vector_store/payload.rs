//! Typed payload records per collection, serialized to JSON only at the
//! store boundary (see the design note on ad-hoc untyped payloads).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// A single stored point: id, vector, and payload.
#[derive(Debug, Clone)]
pub struct Point {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: HashMap<String, Value>,
}

impl Point {
    #[must_use]
    pub fn new(id: impl Into<String>, vector: Vec<f32>, payload: HashMap<String, Value>) -> Self {
        Self {
            id: id.into(),
            vector,
            payload,
        }
    }
}

/// One nearest-neighbor search result.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: String,
    /// Cosine similarity in `[-1, 1]`; higher is more similar.
    pub score: f32,
    pub payload: HashMap<String, Value>,
}

/// Payload stored for a `sessions` point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionPayload {
    pub session_id: String,
    pub chunk_text: String,
    pub date: String,
    pub chunk_index: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality_score: Option<u8>,
    #[serde(default)]
    pub pending_score: bool,
}

impl SessionPayload {
    /// Convert to the untyped map a [`super::VectorStore`] deals in.
    #[must_use]
    pub fn into_map(self) -> HashMap<String, Value> {
        to_map(&self)
    }
}

/// Payload stored for a `reflections` point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReflectionPayload {
    pub session_id: String,
    pub date: String,
    pub failure_description: String,
    pub root_cause: String,
    pub reflection: String,
    pub prevention_rule: String,
    #[serde(default)]
    pub quality_score: u8,
}

impl ReflectionPayload {
    #[must_use]
    pub fn into_map(self) -> HashMap<String, Value> {
        to_map(&self)
    }
}

/// Payload stored for a `rules` point (the search-time mirror of a [`crate::rules::Rule`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulePayload {
    pub text: String,
    pub status: String,
    pub source: String,
    pub categories: Vec<String>,
    pub reinforcement_count: u32,
    pub created_at: String,
}

impl RulePayload {
    #[must_use]
    pub fn into_map(self) -> HashMap<String, Value> {
        to_map(&self)
    }
}

fn to_map<T: Serialize>(value: &T) -> HashMap<String, Value> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => map.into_iter().collect(),
        _ => Map::new().into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_payload_round_trips_through_map() {
        let payload = SessionPayload {
            session_id: "s1".into(),
            chunk_text: "hello".into(),
            date: "2026-01-01".into(),
            chunk_index: 0,
            quality_score: Some(7),
            pending_score: false,
        };
        let map = payload.into_map();
        assert_eq!(map.get("session_id").unwrap(), "s1");
        assert_eq!(map.get("quality_score").unwrap(), 7);
    }

    #[test]
    fn unset_quality_score_is_omitted() {
        let payload = SessionPayload {
            session_id: "s1".into(),
            chunk_text: "hello".into(),
            date: "2026-01-01".into(),
            chunk_index: 0,
            quality_score: None,
            pending_score: true,
        };
        let map = payload.into_map();
        assert!(!map.contains_key("quality_score"));
        assert_eq!(map.get("pending_score").unwrap(), true);
    }
}
