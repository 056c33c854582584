//! Scenario: mirroring active rules into the vector store twice in a row
//! has the same observable effect as doing it once.

use std::sync::Arc;

use pipeline_core::config::{ApprovalMode, Config};
use pipeline_core::constants::collections::RULES;
use pipeline_core::embeddings::{Embedder, HashingEmbedder};
use pipeline_core::llm::{SharedLLMClient, StubLLMClient};
use pipeline_core::rules::ProposalManager;
use pipeline_core::vector_store::memory::InMemoryStore;
use pipeline_core::vector_store::VectorStore;

#[tokio::test]
async fn syncing_twice_leaves_the_same_rules_mirrored_once_each() {
    let store = InMemoryStore::new();
    let llm: SharedLLMClient = Arc::new(StubLLMClient::new("VALID"));
    let embedder = Arc::new(HashingEmbedder::new()) as Arc<dyn Embedder>;
    let mut config = Config::default();
    config.approval_mode = ApprovalMode::Autonomous;
    let dir = tempfile::tempdir().unwrap();
    let proposals = ProposalManager::new(&store, &llm, &embedder, &config, dir.path().join("rules.json"));

    proposals.add_rule("always check return codes before proceeding", "manual", vec![]).await.unwrap();
    proposals.add_rule("retry flaky network calls with backoff", "manual", vec![]).await.unwrap();

    let first = proposals.sync_rules_to_qdrant().await.unwrap();
    let after_first = store.scroll(RULES, None).await.unwrap();

    let second = proposals.sync_rules_to_qdrant().await.unwrap();
    let after_second = store.scroll(RULES, None).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(after_first.len(), after_second.len());

    let mut first_ids: Vec<_> = after_first.iter().map(|p| p.id.clone()).collect();
    let mut second_ids: Vec<_> = after_second.iter().map(|p| p.id.clone()).collect();
    first_ids.sort();
    second_ids.sort();
    assert_eq!(first_ids, second_ids);
}
