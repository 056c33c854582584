//! Scenarios: the active-rule cap retires the least-reinforced active rule
//! to make room for a new one, and a near-duplicate rule is rejected
//! rather than added twice.

use std::sync::Arc;

use pipeline_core::config::{ApprovalMode, Config};
use pipeline_core::embeddings::{Embedder, HashingEmbedder};
use pipeline_core::llm::{SharedLLMClient, StubLLMClient};
use pipeline_core::rules::{ProposalManager, RuleStatus};
use pipeline_core::vector_store::memory::InMemoryStore;

fn harness(config: Config) -> (InMemoryStore, SharedLLMClient, Arc<dyn Embedder>, Config, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    (
        InMemoryStore::new(),
        Arc::new(StubLLMClient::new("VALID")),
        Arc::new(HashingEmbedder::new()) as Arc<dyn Embedder>,
        config,
        dir,
    )
}

#[tokio::test]
async fn adding_beyond_the_cap_retires_the_least_reinforced_active_rule() {
    let mut config = Config::default();
    config.approval_mode = ApprovalMode::Autonomous;
    config.max_active_rules = 2;
    let (store, llm, embedder, config, dir) = harness(config);
    let proposals = ProposalManager::new(&store, &llm, &embedder, &config, dir.path().join("rules.json"));

    let r1 = proposals.add_rule("always check file existence before parsing", "manual", vec![]).await.unwrap();
    let r2 = proposals.add_rule("retry network calls with exponential backoff", "manual", vec![]).await.unwrap();
    assert!(r1.applied);
    assert!(r2.applied);

    // Give r2 a reinforcement edge so r1 is the least-reinforced.
    let mut rules = proposals.load_rules().unwrap();
    for rule in &mut rules {
        if rule.id == r2.rule_id.clone().unwrap() {
            rule.reinforcement_count = 5;
        }
    }
    proposals.save_rules(&rules, "test: seed reinforcement").unwrap();

    let r3 = proposals.add_rule("validate user input against the schema before processing", "manual", vec![]).await.unwrap();
    assert!(r3.applied);

    let rules = proposals.load_rules().unwrap();
    let active_count = rules.iter().filter(|r| r.status == RuleStatus::Active).count();
    assert_eq!(active_count, 2);
    let r1_rule = rules.iter().find(|r| r.id == r1.rule_id.clone().unwrap()).unwrap();
    assert_eq!(r1_rule.status, RuleStatus::Retired);
}

#[tokio::test]
async fn near_duplicate_rule_text_is_rejected() {
    let mut config = Config::default();
    config.approval_mode = ApprovalMode::Autonomous;
    config.deduplication_similarity = 0.1;
    let (store, llm, embedder, config, dir) = harness(config);
    let proposals = ProposalManager::new(&store, &llm, &embedder, &config, dir.path().join("rules.json"));

    let first = proposals
        .add_rule("always validate configuration before starting the server", "manual", vec![])
        .await
        .unwrap();
    assert!(first.applied);

    let second = proposals
        .add_rule("always validate configuration before starting the server", "manual", vec![])
        .await
        .unwrap();
    assert!(!second.applied);

    let rules = proposals.load_rules().unwrap();
    assert_eq!(rules.len(), 1);
}

#[tokio::test]
async fn empty_rule_text_is_rejected_without_touching_the_registry() {
    let config = Config::default();
    let (store, llm, embedder, config, dir) = harness(config);
    let proposals = ProposalManager::new(&store, &llm, &embedder, &config, dir.path().join("rules.json"));

    let outcome = proposals.add_rule("   ", "manual", vec![]).await.unwrap();
    assert!(!outcome.applied);
    assert!(!dir.path().join("rules.json").exists());
}
