//! Contrastive rule mining from scored chunks: pairs of a high-quality and
//! a low-quality chunk go to the LLM together, and any rule lines it
//! returns are funneled into the [`crate::rules::ProposalManager`].

use serde_json::Value;
use tracing::warn;

use crate::config::Config;
use crate::constants::collections::SESSIONS;
use crate::constants::defaults::{INSIGHT_BATCH_SIZE, INSIGHT_MAX_PAIRS};
use crate::error::Result;
use crate::llm::parsing::parse_rule_lines;
use crate::llm::{complete_with_timeout, Prompt, SharedLLMClient};
use crate::rules::ProposalManager;
use crate::vector_store::{Filter, Point, VectorStore};

const MIN_CHUNK_LEN: usize = 40;
const INSIGHT_SOURCE: &str = "insight-extraction";

/// Candidate (high-quality, low-quality) chunk pair handed to one LLM call.
struct ChunkPair<'a> {
    high: &'a Point,
    low: &'a Point,
}

/// Mines contrastive rules from `sessions`.
pub struct InsightExtractor<'a> {
    store: &'a dyn VectorStore,
    llm: &'a SharedLLMClient,
    config: &'a Config,
}

impl<'a> InsightExtractor<'a> {
    #[must_use]
    pub fn new(store: &'a dyn VectorStore, llm: &'a SharedLLMClient, config: &'a Config) -> Self {
        Self { store, llm, config }
    }

    /// Run one extraction pass, proposing candidate rules through `proposals`.
    pub async fn run(&self, proposals: &ProposalManager<'_>) -> Result<usize> {
        let high = self.scroll_by_quality(self.config.quality_threshold_success, true).await?;
        let low = self.scroll_by_quality(self.config.quality_threshold_failure, false).await?;
        if high.is_empty() || low.is_empty() {
            return Ok(0);
        }

        let pairs: Vec<ChunkPair<'_>> = (0..high.len().min(INSIGHT_MAX_PAIRS))
            .map(|i| ChunkPair {
                high: &high[i],
                low: &low[i % low.len()],
            })
            .collect();

        let mut proposed = 0;
        for batch in pairs.chunks(INSIGHT_BATCH_SIZE) {
            let rule_texts = self.extract_rules_for_batch(batch).await;
            for (text, pair) in rule_texts {
                let high_sid = session_id_of(pair.high);
                let low_sid = session_id_of(pair.low);
                let outcome = proposals
                    .add_rule(&text, INSIGHT_SOURCE, vec![high_sid, low_sid])
                    .await?;
                if outcome.applied {
                    proposed += 1;
                }
            }
        }
        Ok(proposed)
    }

    async fn scroll_by_quality(&self, threshold: u8, high: bool) -> Result<Vec<Point>> {
        let filter = if high {
            Filter::new().gte("quality_score", threshold)
        } else {
            Filter::new().lte("quality_score", threshold)
        };
        let points = self.store.scroll(SESSIONS, Some(&filter)).await?;
        Ok(points
            .into_iter()
            .filter(|p| {
                p.payload
                    .get("chunk_text")
                    .and_then(Value::as_str)
                    .is_some_and(|t| t.chars().count() > MIN_CHUNK_LEN)
            })
            .collect())
    }

    async fn extract_rules_for_batch<'p>(
        &self,
        batch: &'p [ChunkPair<'p>],
    ) -> Vec<(String, &'p ChunkPair<'p>)> {
        let prompt_body = batch
            .iter()
            .enumerate()
            .map(|(i, pair)| {
                format!(
                    "Pair {}:\nGOOD:\n{}\nBAD:\n{}",
                    i + 1,
                    chunk_text(pair.high),
                    chunk_text(pair.low)
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        let prompt = Prompt::new(
            "For each pair of a reusable (GOOD) and a non-reusable (BAD) conversation \
             excerpt, write 1-2 short actionable rules that explain what the GOOD excerpt \
             did differently. Respond with one rule per line.",
            prompt_body,
        );

        let raw = complete_with_timeout(self.llm.as_ref(), prompt)
            .await
            .unwrap_or_default();
        let lines = parse_rule_lines(&raw);
        if lines.is_empty() {
            warn!("insight extraction batch returned no parseable rule lines");
        }

        // Every rule in the batch response is attributed to the whole
        // batch's pairs; assign each line round-robin across the pairs it
        // was drawn from so sourceSessionIds stays meaningful.
        lines
            .into_iter()
            .enumerate()
            .map(|(i, line)| (line.text, &batch[i % batch.len()]))
            .collect()
    }
}

fn chunk_text(point: &Point) -> &str {
    point
        .payload
        .get("chunk_text")
        .and_then(Value::as_str)
        .unwrap_or_default()
}

fn session_id_of(point: &Point) -> String {
    point
        .payload
        .get("session_id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::{Embedder, HashingEmbedder};
    use crate::llm::StubLLMClient;
    use crate::vector_store::memory::InMemoryStore;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn point(id: &str, session_id: &str, text: &str, score: i64) -> Point {
        let mut payload = HashMap::new();
        payload.insert("session_id".to_string(), json!(session_id));
        payload.insert("chunk_text".to_string(), json!(text));
        payload.insert("quality_score".to_string(), json!(score));
        Point::new(id, vec![1.0, 0.0, 0.0], payload)
    }

    #[tokio::test]
    async fn produces_a_proposal_from_a_contrastive_pair() {
        let store = InMemoryStore::new();
        store
            .upsert(
                SESSIONS,
                point(
                    "a",
                    "high-session",
                    "decided to write a regression test before shipping the fix, which caught a second bug",
                    9,
                ),
            )
            .await
            .unwrap();
        store
            .upsert(
                SESSIONS,
                point(
                    "b",
                    "low-session",
                    "shipped the change straight away without running the test suite at all",
                    1,
                ),
            )
            .await
            .unwrap();

        let llm: SharedLLMClient = Arc::new(StubLLMClient::new(
            "- Write a regression test before shipping a fix.",
        ));
        let config = Config::default();
        let embedder = Arc::new(HashingEmbedder::new()) as Arc<dyn Embedder>;
        let registry = tempfile::tempdir().unwrap();
        let proposals = ProposalManager::new(
            &store,
            &llm,
            &embedder,
            &config,
            registry.path().join("rules.json"),
        );

        let extractor = InsightExtractor::new(&store, &llm, &config);
        let proposed = extractor.run(&proposals).await.unwrap();
        assert_eq!(proposed, 1);
    }

    #[tokio::test]
    async fn no_high_or_low_quality_chunks_yields_zero_proposals() {
        let store = InMemoryStore::new();
        let llm: SharedLLMClient = Arc::new(StubLLMClient::new(""));
        let config = Config::default();
        let embedder = Arc::new(HashingEmbedder::new()) as Arc<dyn Embedder>;
        let registry = tempfile::tempdir().unwrap();
        let proposals = ProposalManager::new(
            &store,
            &llm,
            &embedder,
            &config,
            registry.path().join("rules.json"),
        );

        let extractor = InsightExtractor::new(&store, &llm, &config);
        assert_eq!(extractor.run(&proposals).await.unwrap(), 0);
    }
}
