//! Failure-signal-driven reflection extraction.

pub mod signals;

use chrono::Utc;
use tracing::warn;

use crate::constants::collections::REFLECTIONS;
use crate::embeddings::Embedder;
use crate::error::Result;
use crate::ledger::ProcessingLedger;
use crate::llm::parsing::parse_reflection_triple;
use crate::llm::{complete_with_timeout, Prompt, SharedLLMClient};
use crate::rules::ProposalManager;
use crate::session::SessionMessage;
use crate::vector_store::payload::ReflectionPayload;
use crate::vector_store::{Point, VectorStore};
use signals::{detect_signals, FailureSignal};

const REFLECTION_SOURCE: &str = "reflection";

/// Scans sessions for failure signals and turns them into reflections.
pub struct ReflectionGenerator<'a> {
    store: &'a dyn VectorStore,
    llm: &'a SharedLLMClient,
    embedder: &'a std::sync::Arc<dyn Embedder>,
}

impl<'a> ReflectionGenerator<'a> {
    #[must_use]
    pub fn new(
        store: &'a dyn VectorStore,
        llm: &'a SharedLLMClient,
        embedder: &'a std::sync::Arc<dyn Embedder>,
    ) -> Self {
        Self { store, llm, embedder }
    }

    /// Process one session's messages, guarded by `ledger` for at-most-once
    /// semantics, funneling any prevention rules through `proposals`.
    pub async fn process_session(
        &self,
        session_id: &str,
        messages: &[SessionMessage],
        ledger: &mut ProcessingLedger,
        proposals: &ProposalManager<'_>,
    ) -> Result<usize> {
        if ledger.is_processed(session_id) {
            return Ok(0);
        }

        let signals = detect_signals(messages);
        let mut produced = 0;

        for (ordinal, signal) in signals.iter().enumerate() {
            if self.process_signal(session_id, ordinal, signal, proposals).await? {
                produced += 1;
            }
        }

        ledger.mark(session_id, produced > 0)?;
        Ok(produced)
    }

    async fn process_signal(
        &self,
        session_id: &str,
        ordinal: usize,
        signal: &FailureSignal,
        proposals: &ProposalManager<'_>,
    ) -> Result<bool> {
        let (failure_description, excerpt) = describe_signal(signal);
        let prompt = Prompt::new(
            "A coding assistant session hit a failure. Respond with exactly three lines: \
             ROOT_CAUSE: <one sentence>, REFLECTION: <corrective free-form text>, \
             PREVENTION_RULE: <one short actionable rule>.",
            format!("Failure: {failure_description}\n\nExcerpt:\n{excerpt}"),
        );

        let raw = complete_with_timeout(self.llm.as_ref(), prompt)
            .await
            .unwrap_or_default();
        let Some(triple) = parse_reflection_triple(&raw) else {
            warn!(session_id, "malformed reflection response, discarding");
            return Ok(false);
        };

        let date = Utc::now().format("%Y-%m-%d").to_string();
        let payload = ReflectionPayload {
            session_id: session_id.to_string(),
            date,
            failure_description,
            root_cause: triple.root_cause,
            reflection: triple.reflection,
            prevention_rule: triple.prevention_rule.clone(),
            quality_score: 0,
        };

        let vector = self.embedder.embed(&payload.reflection).await?;
        let point_id = format!("reflection-{session_id}-{ordinal}");
        self.store
            .ensure_collection(REFLECTIONS, self.embedder.dimension())
            .await?;
        self.store
            .upsert(REFLECTIONS, Point::new(point_id, vector, payload.into_map()))
            .await?;

        proposals
            .add_rule(&triple.prevention_rule, REFLECTION_SOURCE, vec![session_id.to_string()])
            .await?;
        Ok(true)
    }
}

fn describe_signal(signal: &FailureSignal) -> (String, String) {
    match signal {
        FailureSignal::RetryLoop { excerpt } => ("retry-loop".to_string(), excerpt.clone()),
        FailureSignal::Backtracking { path, excerpt } => {
            (format!("backtracking on {path}"), excerpt.clone())
        }
        FailureSignal::GitRevert { excerpt } => ("git-revert".to_string(), excerpt.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::embeddings::HashingEmbedder;
    use crate::llm::StubLLMClient;
    use crate::vector_store::memory::InMemoryStore;
    use std::sync::Arc;

    fn msg(role: &str, content: &str) -> SessionMessage {
        SessionMessage {
            role: role.to_string(),
            content: content.to_string(),
        }
    }

    #[tokio::test]
    async fn failure_signal_produces_reflection_and_prevention_rule() {
        let store = InMemoryStore::new();
        let llm: SharedLLMClient = Arc::new(StubLLMClient::new(
            "ROOT_CAUSE: forgot to check the config file existed\n\
             REFLECTION: should verify file presence before parsing it\n\
             PREVENTION_RULE: check a file exists before attempting to parse it",
        ));
        let embedder = Arc::new(HashingEmbedder::new()) as Arc<dyn Embedder>;
        let config = Config::default();
        let registry = tempfile::tempdir().unwrap();
        let proposals = ProposalManager::new(
            &store,
            &llm,
            &embedder,
            &config,
            registry.path().join("rules.json"),
        );
        let generator = ReflectionGenerator::new(&store, &llm, &embedder);
        let mut ledger = ProcessingLedger::load(registry.path().join("reflection-state.json")).unwrap();

        let messages = vec![
            msg("assistant", "error: the build failed again"),
            msg("assistant", "still failed, exception raised here too"),
            msg("assistant", "error: another failed attempt at this"),
        ];

        let produced = generator
            .process_session("s1", &messages, &mut ledger, &proposals)
            .await
            .unwrap();
        assert_eq!(produced, 1);
        assert_eq!(store.count(REFLECTIONS).await.unwrap(), 1);
        assert!(ledger.is_processed("s1"));
    }

    #[tokio::test]
    async fn already_processed_session_is_skipped() {
        let store = InMemoryStore::new();
        let llm: SharedLLMClient = Arc::new(StubLLMClient::new("not a valid triple"));
        let embedder = Arc::new(HashingEmbedder::new()) as Arc<dyn Embedder>;
        let config = Config::default();
        let registry = tempfile::tempdir().unwrap();
        let proposals = ProposalManager::new(
            &store,
            &llm,
            &embedder,
            &config,
            registry.path().join("rules.json"),
        );
        let generator = ReflectionGenerator::new(&store, &llm, &embedder);
        let mut ledger = ProcessingLedger::load(registry.path().join("reflection-state.json")).unwrap();
        ledger.mark("s1", false).unwrap();

        let messages = vec![
            msg("assistant", "error: failed"),
            msg("assistant", "error: failed"),
            msg("assistant", "error: failed"),
        ];
        let produced = generator
            .process_session("s1", &messages, &mut ledger, &proposals)
            .await
            .unwrap();
        assert_eq!(produced, 0);
    }

    #[tokio::test]
    async fn malformed_llm_response_is_discarded() {
        let store = InMemoryStore::new();
        let llm: SharedLLMClient = Arc::new(StubLLMClient::new("not a valid triple at all"));
        let embedder = Arc::new(HashingEmbedder::new()) as Arc<dyn Embedder>;
        let config = Config::default();
        let registry = tempfile::tempdir().unwrap();
        let proposals = ProposalManager::new(
            &store,
            &llm,
            &embedder,
            &config,
            registry.path().join("rules.json"),
        );
        let generator = ReflectionGenerator::new(&store, &llm, &embedder);
        let mut ledger = ProcessingLedger::load(registry.path().join("reflection-state.json")).unwrap();

        let messages = vec![
            msg("assistant", "error: failed again"),
            msg("assistant", "error: failed once more"),
            msg("assistant", "error: failed a third time"),
        ];
        let produced = generator
            .process_session("s1", &messages, &mut ledger, &proposals)
            .await
            .unwrap();
        assert_eq!(produced, 0);
        assert_eq!(store.count(REFLECTIONS).await.unwrap(), 0);
    }
}
