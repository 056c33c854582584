//! Rule reinforcement scanning and staleness-based pruning.

use chrono::Utc;
use tracing::{info, warn};

use crate::config::Config;
use crate::constants::collections::SESSIONS;
use crate::embeddings::Embedder;
use crate::error::Result;
use crate::rules::{ProposalManager, Rule, RuleStatus};
use crate::vector_store::{Filter, VectorStore};

/// Counts from one [`ReinforcementTracker::scan`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReinforcementSummary {
    pub rules_reinforced: usize,
    pub total_reinforcements: usize,
}

/// Counts from one [`ReinforcementTracker::prune`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneSummary {
    pub retired: usize,
    pub aging: usize,
}

/// Maintains rule freshness: reinforcement scanning and staleness pruning.
pub struct ReinforcementTracker<'a> {
    store: &'a dyn VectorStore,
    embedder: &'a std::sync::Arc<dyn Embedder>,
    config: &'a Config,
}

impl<'a> ReinforcementTracker<'a> {
    #[must_use]
    pub fn new(
        store: &'a dyn VectorStore,
        embedder: &'a std::sync::Arc<dyn Embedder>,
        config: &'a Config,
    ) -> Self {
        Self {
            store,
            embedder,
            config,
        }
    }

    /// For every active rule, search for reinforcing chunks and update its
    /// `reinforcementCount`/`lastReinforced`.
    pub async fn scan(&self, proposals: &ProposalManager<'_>) -> Result<ReinforcementSummary> {
        let mut rules = proposals.load_rules()?;
        let mut summary = ReinforcementSummary::default();
        let now = Utc::now();

        for rule in &mut rules {
            if rule.status != RuleStatus::Active {
                continue;
            }
            let retained = self.retained_hits(rule).await?;
            if retained == 0 {
                continue;
            }
            rule.reinforcement_count += retained as u32;
            rule.last_reinforced = now;
            summary.rules_reinforced += 1;
            summary.total_reinforcements += retained;
        }

        if summary.rules_reinforced > 0 {
            proposals.save_rules(&rules, "chore(rules): record reinforcement scan")?;
        }
        Ok(summary)
    }

    async fn retained_hits(&self, rule: &Rule) -> Result<usize> {
        let vector = self.embedder.embed(&rule.text).await?;
        let filter = Filter::new().gte("quality_score", self.config.reinforcement_quality_min);
        let hits = self
            .store
            .search(SESSIONS, &vector, self.config.reinforcement_search_limit, Some(&filter))
            .await?;

        let cutoff = Utc::now() - chrono::Duration::days(self.config.reinforcement_window_days);
        let retained = hits
            .iter()
            .filter(|hit| hit.score >= self.config.reinforcement_score_threshold)
            .filter(|hit| {
                hit.payload
                    .get("session_id")
                    .and_then(serde_json::Value::as_str)
                    .is_some_and(|sid| !rule.source_session_ids.iter().any(|s| s == sid))
            })
            .filter(|hit| {
                hit.payload
                    .get("date")
                    .and_then(serde_json::Value::as_str)
                    .and_then(|d| chrono::NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
                    .is_some_and(|date| date.and_hms_opt(0, 0, 0).unwrap().and_utc() >= cutoff)
            })
            .count();
        Ok(retained)
    }

    /// Retire active rules past the staleness threshold with too few
    /// reinforcements, exempting rules with `reinforcementCount >= 10`
    /// (`Config::STALENESS_EXEMPT_REINFORCEMENTS`).
    pub async fn prune(&self, proposals: &ProposalManager<'_>) -> Result<PruneSummary> {
        let mut rules = proposals.load_rules()?;
        let mut summary = PruneSummary::default();
        let now = Utc::now();
        let mut to_delete = Vec::new();

        for rule in &mut rules {
            if rule.status != RuleStatus::Active {
                continue;
            }
            if rule.reinforcement_count >= Config::STALENESS_EXEMPT_REINFORCEMENTS {
                continue;
            }
            let age_days = (now - rule.last_reinforced).num_days();
            if age_days > self.config.staleness_threshold_days {
                if rule.reinforcement_count < self.config.min_reinforcements_to_keep {
                    rule.status = RuleStatus::Retired;
                    to_delete.push(rule.id.clone());
                    summary.retired += 1;
                }
            } else if age_days > self.config.staleness_threshold_days / 2 {
                info!(rule_id = %rule.id, age_days, "rule aging but not yet retired");
                summary.aging += 1;
            }
        }

        if summary.retired > 0 {
            proposals.save_rules(&rules, "chore(rules): prune stale rules")?;
            if let Err(e) = proposals.delete_from_mirror(&to_delete).await {
                warn!(error = %e, "deleting retired rules from vector store mirror failed");
            }
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashingEmbedder;
    use crate::llm::{SharedLLMClient, StubLLMClient};
    use crate::rules::{RuleSource, RuleStatus};
    use crate::vector_store::memory::InMemoryStore;
    use std::sync::Arc;

    fn rule(id: &str, reinforcement_count: u32, days_since_reinforced: i64) -> Rule {
        Rule {
            id: id.to_string(),
            text: format!("rule text {id}"),
            source: RuleSource::Manual.as_str().to_string(),
            status: RuleStatus::Active,
            reinforcement_count,
            created_at: Utc::now() - chrono::Duration::days(100),
            last_reinforced: Utc::now() - chrono::Duration::days(days_since_reinforced),
            source_session_ids: vec![],
            categories: std::collections::BTreeSet::from(["general".to_string()]),
        }
    }

    #[tokio::test]
    async fn stale_rule_with_few_reinforcements_is_retired() {
        let store = InMemoryStore::new();
        let llm: SharedLLMClient = Arc::new(StubLLMClient::new("VALID"));
        let embedder = Arc::new(HashingEmbedder::new()) as Arc<dyn Embedder>;
        let mut config = Config::default();
        config.staleness_threshold_days = 30;
        config.min_reinforcements_to_keep = 3;
        let dir = tempfile::tempdir().unwrap();
        let registry_path = dir.path().join("rules.json");
        let proposals = ProposalManager::new(&store, &llm, &embedder, &config, registry_path);
        proposals
            .save_rules(&[rule("r1", 2, 40)], "test: seed")
            .unwrap();

        let tracker = ReinforcementTracker::new(&store, &embedder, &config);
        let summary = tracker.prune(&proposals).await.unwrap();
        assert_eq!(summary.retired, 1);

        let rules = proposals.load_rules().unwrap();
        assert_eq!(rules[0].status, RuleStatus::Retired);
    }

    #[tokio::test]
    async fn rule_with_ten_or_more_reinforcements_is_exempt() {
        let store = InMemoryStore::new();
        let llm: SharedLLMClient = Arc::new(StubLLMClient::new("VALID"));
        let embedder = Arc::new(HashingEmbedder::new()) as Arc<dyn Embedder>;
        let mut config = Config::default();
        config.staleness_threshold_days = 30;
        config.min_reinforcements_to_keep = 3;
        let dir = tempfile::tempdir().unwrap();
        let proposals = ProposalManager::new(&store, &llm, &embedder, &config, dir.path().join("rules.json"));
        proposals.save_rules(&[rule("r1", 10, 90)], "test: seed").unwrap();

        let tracker = ReinforcementTracker::new(&store, &embedder, &config);
        let summary = tracker.prune(&proposals).await.unwrap();
        assert_eq!(summary.retired, 0);

        let rules = proposals.load_rules().unwrap();
        assert_eq!(rules[0].status, RuleStatus::Active);
    }

    #[tokio::test]
    async fn reinforcement_count_never_decreases_across_scans() {
        let store = InMemoryStore::new();
        let llm: SharedLLMClient = Arc::new(StubLLMClient::new("VALID"));
        let embedder = Arc::new(HashingEmbedder::new()) as Arc<dyn Embedder>;
        let config = Config::default();
        let dir = tempfile::tempdir().unwrap();
        let proposals = ProposalManager::new(&store, &llm, &embedder, &config, dir.path().join("rules.json"));
        proposals.save_rules(&[rule("r1", 4, 1)], "test: seed").unwrap();

        let tracker = ReinforcementTracker::new(&store, &embedder, &config);
        tracker.scan(&proposals).await.unwrap();
        let after_first = proposals.load_rules().unwrap()[0].reinforcement_count;
        tracker.scan(&proposals).await.unwrap();
        let after_second = proposals.load_rules().unwrap()[0].reinforcement_count;
        assert!(after_second >= after_first);
    }
}
