//! Skill-candidate generation from novel, high-quality sessions.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::config::{ApprovalMode, Config};
use crate::constants::collections::SESSIONS;
use crate::constants::defaults::{NOVELTY_TOP_K, SUMMARY_MESSAGE_WINDOW};
use crate::embeddings::Embedder;
use crate::error::{Error, Result};
use crate::ledger::ProcessingLedger;
use crate::llm::parsing::parse_skill_document;
use crate::llm::{complete_with_timeout, Prompt, SharedLLMClient};
use crate::session::SessionMessage;
use crate::vector_store::{Filter, VectorStore};
use crate::workspace::Layout;

/// Where a skill candidate sits relative to promotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateStatus {
    Proposed,
    Approved,
    Rejected,
}

/// A proposed reusable procedure, persisted to a per-candidate file until
/// explicitly promoted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillCandidate {
    pub name: String,
    pub description: String,
    pub status: CandidateStatus,
    pub skill_text: String,
    pub auto_activation: Vec<String>,
    pub source_session_id: String,
    pub novelty_score: f32,
    pub quality_score: f32,
}

/// Generates skill candidates from sessions the pipeline hasn't already
/// considered.
pub struct SkillGenerator<'a> {
    store: &'a dyn VectorStore,
    llm: &'a SharedLLMClient,
    embedder: &'a std::sync::Arc<dyn Embedder>,
    config: &'a Config,
    layout: Layout<'a>,
}

impl<'a> SkillGenerator<'a> {
    #[must_use]
    pub fn new(
        store: &'a dyn VectorStore,
        llm: &'a SharedLLMClient,
        embedder: &'a std::sync::Arc<dyn Embedder>,
        config: &'a Config,
        layout: Layout<'a>,
    ) -> Self {
        Self {
            store,
            llm,
            embedder,
            config,
            layout,
        }
    }

    /// Consider one session for a skill candidate, guarded by `ledger`.
    pub async fn process_session(
        &self,
        session_id: &str,
        messages: &[SessionMessage],
        ledger: &mut ProcessingLedger,
    ) -> Result<Option<SkillCandidate>> {
        if ledger.is_processed(session_id) {
            return Ok(None);
        }

        let avg_quality = self.average_quality(session_id).await?;
        if avg_quality < f32::from(self.config.quality_threshold_success) {
            ledger.mark(session_id, false)?;
            return Ok(None);
        }

        let summary = self.summarize(messages).await?;
        let summary_vector = self.embedder.embed(&summary).await?;
        let mean_similarity = self.mean_top_k_similarity(&summary_vector).await?;

        if mean_similarity >= self.config.novelty_threshold {
            ledger.mark(session_id, false)?;
            return Ok(None);
        }
        let novelty_score = 1.0 - mean_similarity;

        let Some(candidate) = self
            .draft_candidate(session_id, &summary, novelty_score, avg_quality)
            .await?
        else {
            ledger.mark(session_id, false)?;
            return Ok(None);
        };

        if matches!(self.config.approval_mode, ApprovalMode::Autonomous) {
            self.try_promote(&candidate)?;
        } else {
            self.persist_candidate(&candidate)?;
        }

        ledger.mark(session_id, true)?;
        Ok(Some(candidate))
    }

    async fn average_quality(&self, session_id: &str) -> Result<f32> {
        let filter = Filter::new().eq("session_id", session_id);
        let points = self.store.scroll(SESSIONS, Some(&filter)).await?;
        let scores: Vec<f64> = points
            .iter()
            .filter_map(|p| p.payload.get("quality_score").and_then(Value::as_f64))
            .collect();
        if scores.is_empty() {
            return Ok(0.0);
        }
        #[allow(clippy::cast_possible_truncation)]
        let avg = (scores.iter().sum::<f64>() / scores.len() as f64) as f32;
        Ok(avg)
    }

    async fn summarize(&self, messages: &[SessionMessage]) -> Result<String> {
        let window: Vec<&SessionMessage> = messages.iter().take(SUMMARY_MESSAGE_WINDOW).collect();
        let transcript = window
            .iter()
            .map(|m| format!("[{}]: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = Prompt::new(
            "Summarize this coding-assistant session in 2-3 sentences, focused on what \
             procedure or approach made it succeed.",
            transcript,
        );
        complete_with_timeout(self.llm.as_ref(), prompt).await
    }

    async fn mean_top_k_similarity(&self, vector: &[f32]) -> Result<f32> {
        let hits = self.store.search(SESSIONS, vector, NOVELTY_TOP_K, None).await?;
        if hits.is_empty() {
            return Ok(0.0);
        }
        #[allow(clippy::cast_possible_truncation)]
        let mean = hits.iter().map(|h| h.score).sum::<f32>() / hits.len() as f32;
        Ok(mean)
    }

    async fn draft_candidate(
        &self,
        session_id: &str,
        summary: &str,
        novelty_score: f32,
        quality_score: f32,
    ) -> Result<Option<SkillCandidate>> {
        let prompt = Prompt::new(
            "Draft a reusable SKILL document for a coding assistant from this session \
             summary. Respond with a header of `name:`, `description:`, and \
             `auto_activation:` lines, followed by a body with `## When to Use`, \
             `## Instructions`, and `## Verification` sections.",
            summary.to_string(),
        );
        let raw = complete_with_timeout(self.llm.as_ref(), prompt)
            .await
            .unwrap_or_default();
        let Some(doc) = parse_skill_document(&raw) else {
            warn!(session_id, "skill draft response malformed, skipping");
            return Ok(None);
        };

        let skill_text = format!(
            "name: {}\ndescription: {}\nauto_activation: {}\n\n{}",
            doc.name, doc.description, doc.auto_activation, doc.body
        );
        Ok(Some(SkillCandidate {
            name: doc.name,
            description: doc.description,
            status: CandidateStatus::Proposed,
            skill_text,
            auto_activation: doc
                .auto_activation
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            source_session_id: session_id.to_string(),
            novelty_score,
            quality_score,
        }))
    }

    fn persist_candidate(&self, candidate: &SkillCandidate) -> Result<()> {
        let dir = self.layout.skill_candidates_dir();
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{}.json", candidate.name));
        let serialized = serde_json::to_string_pretty(candidate)
            .map_err(|e| Error::RegistryIo(format!("serializing skill candidate: {e}")))?;
        std::fs::write(path, serialized)?;
        Ok(())
    }

    fn try_promote(&self, candidate: &SkillCandidate) -> Result<()> {
        let skills_dir = self.layout.skills_dir();
        if name_taken(&skills_dir, &candidate.name)? {
            warn!(name = %candidate.name, "skill name already promoted, staging instead");
            return self.persist_candidate(candidate);
        }
        if description_overlaps_existing(&skills_dir, &candidate.description)? {
            warn!(name = %candidate.name, "skill description overlaps an existing skill, staging instead");
            return self.persist_candidate(candidate);
        }

        let dest_dir = skills_dir.join(&candidate.name);
        std::fs::create_dir_all(&dest_dir)?;
        std::fs::write(dest_dir.join("SKILL.md"), &candidate.skill_text)?;
        info!(name = %candidate.name, "promoted skill");
        Ok(())
    }
}

fn name_taken(skills_dir: &Path, name: &str) -> Result<bool> {
    Ok(skills_dir.join(name).join("SKILL.md").exists())
}

const DESCRIPTION_OVERLAP_THRESHOLD: f64 = 0.6;

fn description_overlaps_existing(skills_dir: &Path, description: &str) -> Result<bool> {
    let Ok(entries) = std::fs::read_dir(skills_dir) else {
        return Ok(false);
    };
    let candidate_words = word_set(description);
    if candidate_words.is_empty() {
        return Ok(false);
    }

    for entry in entries.filter_map(std::result::Result::ok) {
        let skill_path = entry.path().join("SKILL.md");
        let Ok(content) = std::fs::read_to_string(&skill_path) else {
            continue;
        };
        let Some(existing_description) = content
            .lines()
            .find_map(|l| l.strip_prefix("description:"))
        else {
            continue;
        };
        let existing_words = word_set(existing_description);
        if existing_words.is_empty() {
            continue;
        }
        let overlap = candidate_words.intersection(&existing_words).count();
        let ratio = overlap as f64 / candidate_words.len().min(existing_words.len()) as f64;
        if ratio >= DESCRIPTION_OVERLAP_THRESHOLD {
            return Ok(true);
        }
    }
    Ok(false)
}

fn word_set(text: &str) -> std::collections::HashSet<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashingEmbedder;
    use crate::llm::StubLLMClient;
    use crate::vector_store::memory::InMemoryStore;
    use crate::vector_store::Point;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn msg(role: &str, content: &str) -> SessionMessage {
        SessionMessage {
            role: role.to_string(),
            content: content.to_string(),
        }
    }

    fn high_quality_point(id: &str, session_id: &str) -> Point {
        let mut payload = HashMap::new();
        payload.insert("session_id".to_string(), json!(session_id));
        payload.insert("quality_score".to_string(), json!(8));
        payload.insert("chunk_text".to_string(), json!("some reusable content"));
        Point::new(id, vec![0.1, 0.2, 0.3], payload)
    }

    #[tokio::test]
    async fn novel_high_quality_session_produces_candidate() {
        let store = InMemoryStore::new();
        store.upsert(SESSIONS, high_quality_point("c1", "s1")).await.unwrap();

        let llm: SharedLLMClient = Arc::new(StubLLMClient::with_responses(vec![
            "Built a reusable approach for verifying file existence before parsing.".to_string(),
            "name: verify-file-exists\ndescription: check file presence before parsing\nauto_activation: file parsing\n\n## When to Use\nBefore parsing any file.\n\n## Instructions\nCheck existence first.\n\n## Verification\nConfirm no panics on missing files.".to_string(),
        ]));
        let embedder = Arc::new(HashingEmbedder::new()) as Arc<dyn Embedder>;
        let config = Config::default();
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path());
        let generator = SkillGenerator::new(&store, &llm, &embedder, &config, layout);
        let mut ledger = ProcessingLedger::load(dir.path().join("skill-state.json")).unwrap();

        let messages = vec![msg("user", "please help with this"), msg("assistant", "sure thing")];
        let candidate = generator
            .process_session("s1", &messages, &mut ledger)
            .await
            .unwrap();
        assert!(candidate.is_some());
        assert!(ledger.is_processed("s1"));
    }

    #[tokio::test]
    async fn rerunning_does_not_produce_a_second_candidate() {
        let store = InMemoryStore::new();
        store.upsert(SESSIONS, high_quality_point("c1", "s1")).await.unwrap();
        let llm: SharedLLMClient = Arc::new(StubLLMClient::with_responses(vec![
            "A summary.".to_string(),
            "name: n\ndescription: d\nauto_activation: a\n\n## When to Use\nx".to_string(),
        ]));
        let embedder = Arc::new(HashingEmbedder::new()) as Arc<dyn Embedder>;
        let config = Config::default();
        let dir = tempfile::tempdir().unwrap();
        let layout_path = dir.path().to_path_buf();

        {
            let layout = Layout::new(&layout_path);
            let generator = SkillGenerator::new(&store, &llm, &embedder, &config, layout);
            let mut ledger = ProcessingLedger::load(layout_path.join("skill-state.json")).unwrap();
            let messages = vec![msg("user", "hi"), msg("assistant", "hello")];
            generator.process_session("s1", &messages, &mut ledger).await.unwrap();
        }

        let layout = Layout::new(&layout_path);
        let generator = SkillGenerator::new(&store, &llm, &embedder, &config, layout);
        let mut ledger = ProcessingLedger::load(layout_path.join("skill-state.json")).unwrap();
        let messages = vec![msg("user", "hi"), msg("assistant", "hello")];
        let second = generator.process_session("s1", &messages, &mut ledger).await.unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn low_quality_session_is_skipped() {
        let store = InMemoryStore::new();
        let mut payload = HashMap::new();
        payload.insert("session_id".to_string(), json!("s1"));
        payload.insert("quality_score".to_string(), json!(2));
        store
            .upsert(SESSIONS, Point::new("c1", vec![0.1, 0.2, 0.3], payload))
            .await
            .unwrap();

        let llm: SharedLLMClient = Arc::new(StubLLMClient::new(""));
        let embedder = Arc::new(HashingEmbedder::new()) as Arc<dyn Embedder>;
        let config = Config::default();
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path());
        let generator = SkillGenerator::new(&store, &llm, &embedder, &config, layout);
        let mut ledger = ProcessingLedger::load(dir.path().join("skill-state.json")).unwrap();
        let messages = vec![msg("user", "hi"), msg("assistant", "hello")];
        let candidate = generator.process_session("s1", &messages, &mut ledger).await.unwrap();
        assert!(candidate.is_none());
    }
}
