//! Two-phase chunk quality scoring: a pure heuristic pre-filter, then a
//! bounded-concurrency LLM pass for whatever the heuristic can't decide.

pub mod heuristic;

use std::collections::HashMap;

use futures::stream::{self, StreamExt};
use serde_json::json;
use tracing::warn;

use crate::constants::collections::SESSIONS;
use crate::constants::defaults::{SCORE_BATCH_SIZE, SCORE_CONCURRENCY, SCORE_FALLBACK};
use crate::error::Result;
use crate::llm::parsing::parse_score_array;
use crate::llm::{complete_with_timeout, Prompt, SharedLLMClient};
use crate::vector_store::{Filter, Point, VectorStore};

/// Selection criteria for [`QualityScorer::points_to_score`].
#[derive(Debug, Clone, Default)]
pub struct ScoreSelection {
    /// Re-score chunks that already have a `quality_score`.
    pub rescore: bool,
    /// Restrict to one session.
    pub session_id: Option<String>,
    /// Restrict to chunks marked `pending_score=true`.
    pub pending_only: bool,
}

/// Drives the heuristic + LLM scoring pass over `sessions`.
pub struct QualityScorer<'a> {
    store: &'a dyn VectorStore,
    llm: &'a SharedLLMClient,
}

impl<'a> QualityScorer<'a> {
    #[must_use]
    pub fn new(store: &'a dyn VectorStore, llm: &'a SharedLLMClient) -> Self {
        Self { store, llm }
    }

    /// Points eligible for scoring under `selection`.
    pub async fn points_to_score(&self, selection: &ScoreSelection) -> Result<Vec<Point>> {
        let mut filter = Filter::new();
        if let Some(session_id) = &selection.session_id {
            filter = filter.eq("session_id", session_id.clone());
        }
        if selection.pending_only {
            filter = filter.eq("pending_score", true);
        }
        let points = self.store.scroll(SESSIONS, Some(&filter)).await?;
        Ok(points
            .into_iter()
            .filter(|p| selection.rescore || !p.payload.contains_key("quality_score"))
            .collect())
    }

    /// Mark every selected point `pending_score=true`, leaving
    /// `quality_score` untouched. Used for fast shutdown.
    pub async fn mark_pending(&self, selection: &ScoreSelection) -> Result<usize> {
        let points = self.points_to_score(selection).await?;
        let ids: Vec<String> = points.iter().map(|p| p.id.clone()).collect();
        if ids.is_empty() {
            return Ok(0);
        }
        let mut patch = HashMap::new();
        patch.insert("pending_score".to_string(), json!(true));
        self.store.set_payload(SESSIONS, &ids, patch).await?;
        Ok(ids.len())
    }

    /// Run the full two-phase scoring pass over `selection`.
    pub async fn score(&self, selection: &ScoreSelection) -> Result<ScoreSummary> {
        let points = self.points_to_score(selection).await?;
        let mut summary = ScoreSummary::default();

        let mut heuristic_groups: HashMap<u8, Vec<String>> = HashMap::new();
        let mut needs_llm: Vec<Point> = Vec::new();

        for point in points {
            let text = point
                .payload
                .get("chunk_text")
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            match heuristic::pre_filter(text) {
                Some(score) => {
                    heuristic_groups.entry(score).or_default().push(point.id.clone());
                    summary.heuristic += 1;
                }
                None => needs_llm.push(point),
            }
        }

        for (score, ids) in heuristic_groups {
            let mut patch = HashMap::new();
            patch.insert("quality_score".to_string(), json!(score));
            patch.insert("pending_score".to_string(), json!(false));
            self.store.set_payload(SESSIONS, &ids, patch).await?;
        }

        summary.llm = needs_llm.len();
        self.score_with_llm(needs_llm).await?;

        Ok(summary)
    }

    async fn score_with_llm(&self, points: Vec<Point>) -> Result<()> {
        let batches: Vec<Vec<Point>> = points
            .chunks(SCORE_BATCH_SIZE)
            .map(<[Point]>::to_vec)
            .collect();

        let llm = self.llm;
        let store = self.store;
        stream::iter(batches)
            .for_each_concurrent(SCORE_CONCURRENCY, |batch| async move {
                if let Err(e) = score_batch(llm, store, &batch).await {
                    warn!(error = %e, "scoring batch failed, leaving fallback scores in place");
                }
            })
            .await;
        Ok(())
    }
}

async fn score_batch(llm: &SharedLLMClient, store: &dyn VectorStore, batch: &[Point]) -> Result<()> {
    let texts: Vec<&str> = batch
        .iter()
        .map(|p| p.payload.get("chunk_text").and_then(|v| v.as_str()).unwrap_or_default())
        .collect();
    let prompt = Prompt::new(
        "You score coding-assistant conversation chunks for long-term reuse value, 0-10. \
         Respond with a bare JSON array of integers, one per chunk, in order.",
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| format!("{}. {t}", i + 1))
            .collect::<Vec<_>>()
            .join("\n\n"),
    );

    let raw = complete_with_timeout(llm.as_ref(), prompt)
        .await
        .unwrap_or_default();
    let scores = parse_score_array(&raw, batch.len(), SCORE_FALLBACK);

    for (point, score) in batch.iter().zip(scores) {
        let mut patch = HashMap::new();
        patch.insert("quality_score".to_string(), json!(score));
        patch.insert("pending_score".to_string(), json!(false));
        store.set_payload(SESSIONS, &[point.id.clone()], patch).await?;
    }
    Ok(())
}

/// Counts from one [`QualityScorer::score`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoreSummary {
    pub heuristic: usize,
    pub llm: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::StubLLMClient;
    use crate::vector_store::memory::InMemoryStore;
    use std::sync::Arc;

    fn point(id: &str, text: &str, score: Option<i64>, pending: bool) -> Point {
        let mut payload = HashMap::new();
        payload.insert("session_id".to_string(), json!("s1"));
        payload.insert("chunk_text".to_string(), json!(text));
        payload.insert("pending_score".to_string(), json!(pending));
        if let Some(s) = score {
            payload.insert("quality_score".to_string(), json!(s));
        }
        Point::new(id, vec![1.0, 0.0, 0.0], payload)
    }

    #[tokio::test]
    async fn heuristic_only_chunk_is_scored_without_llm_call() {
        let store = InMemoryStore::new();
        store.upsert(SESSIONS, point("a", "git status", None, false)).await.unwrap();
        let llm: SharedLLMClient = Arc::new(StubLLMClient::new("[]"));
        let scorer = QualityScorer::new(&store, &llm);

        let summary = scorer.score(&ScoreSelection::default()).await.unwrap();
        assert_eq!(summary.heuristic, 1);
        assert_eq!(summary.llm, 0);

        let points = store.scroll(SESSIONS, None).await.unwrap();
        assert_eq!(points[0].payload.get("quality_score").unwrap(), 3);
    }

    #[tokio::test]
    async fn llm_fallback_on_unparseable_response() {
        let store = InMemoryStore::new();
        let text = "decided to rewrite the retry policy after three failed deploys this week";
        store.upsert(SESSIONS, point("a", text, None, false)).await.unwrap();
        let llm: SharedLLMClient = Arc::new(StubLLMClient::new("sorry, cannot comply"));
        let scorer = QualityScorer::new(&store, &llm);

        scorer.score(&ScoreSelection::default()).await.unwrap();

        let points = store.scroll(SESSIONS, None).await.unwrap();
        assert_eq!(points[0].payload.get("quality_score").unwrap(), SCORE_FALLBACK);
        assert_eq!(points[0].payload.get("pending_score").unwrap(), false);
    }

    #[tokio::test]
    async fn already_scored_chunks_are_excluded_unless_rescoring() {
        let store = InMemoryStore::new();
        store.upsert(SESSIONS, point("a", "git status", Some(7), false)).await.unwrap();
        let llm: SharedLLMClient = Arc::new(StubLLMClient::new("[]"));
        let scorer = QualityScorer::new(&store, &llm);

        let normal = scorer.points_to_score(&ScoreSelection::default()).await.unwrap();
        assert!(normal.is_empty());

        let rescore = scorer
            .points_to_score(&ScoreSelection {
                rescore: true,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(rescore.len(), 1);
    }

    #[tokio::test]
    async fn mark_pending_sets_flag_without_touching_score() {
        let store = InMemoryStore::new();
        store.upsert(SESSIONS, point("a", "git status", None, false)).await.unwrap();
        let llm: SharedLLMClient = Arc::new(StubLLMClient::new("[]"));
        let scorer = QualityScorer::new(&store, &llm);

        scorer.mark_pending(&ScoreSelection::default()).await.unwrap();

        let points = store.scroll(SESSIONS, None).await.unwrap();
        assert_eq!(points[0].payload.get("pending_score").unwrap(), true);
        assert!(!points[0].payload.contains_key("quality_score"));
    }
}
