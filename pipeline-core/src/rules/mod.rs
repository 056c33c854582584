//! Rule lifecycle: the only component that mutates the rule registry.

pub mod categorize;

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::distr::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use crate::config::{ApprovalMode, Config};
use crate::constants::collections::RULES;
use crate::constants::defaults::RULE_ID_LEN;
use crate::embeddings::{cosine_similarity, Embedder};
use crate::error::{Error, Result};
use crate::llm::{complete_with_timeout, Prompt, SharedLLMClient};
use crate::vector_store::{Point, VectorStore};

/// Where a rule came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleSource {
    InsightExtraction,
    Reflection,
    Manual,
}

impl RuleSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InsightExtraction => "insight-extraction",
            Self::Reflection => "reflection",
            Self::Manual => "manual",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "reflection" => Self::Reflection,
            "manual" => Self::Manual,
            _ => Self::InsightExtraction,
        }
    }
}

/// A rule's position in its lifecycle. `Retired` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleStatus {
    Proposed,
    Active,
    Stale,
    Retired,
}

/// A durable rule registry entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub text: String,
    pub source: String,
    pub status: RuleStatus,
    pub reinforcement_count: u32,
    pub created_at: DateTime<Utc>,
    pub last_reinforced: DateTime<Utc>,
    pub source_session_ids: Vec<String>,
    pub categories: BTreeSet<String>,
}

/// Result of an [`ProposalManager::add_rule`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddRuleOutcome {
    pub applied: bool,
    pub reason: Option<String>,
    pub rule_id: Option<String>,
}

/// Active/proposed/retired listing for a human reader.
#[derive(Debug, Clone, Default)]
pub struct RuleReview {
    pub active: Vec<Rule>,
    pub proposed: Vec<Rule>,
    pub retired: Vec<Rule>,
}

fn generate_rule_id() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(RULE_ID_LEN)
        .map(char::from)
        .collect()
}

/// The only component that mutates `rules.json`.
pub struct ProposalManager<'a> {
    store: &'a dyn VectorStore,
    llm: &'a SharedLLMClient,
    embedder: &'a Arc<dyn Embedder>,
    config: &'a Config,
    registry_path: PathBuf,
}

impl<'a> ProposalManager<'a> {
    #[must_use]
    pub fn new(
        store: &'a dyn VectorStore,
        llm: &'a SharedLLMClient,
        embedder: &'a Arc<dyn Embedder>,
        config: &'a Config,
        registry_path: PathBuf,
    ) -> Self {
        Self {
            store,
            llm,
            embedder,
            config,
            registry_path,
        }
    }

    fn read_registry(&self) -> Result<Vec<Rule>> {
        if !self.registry_path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.registry_path)
            .map_err(|e| Error::RegistryIo(format!("reading {}: {e}", self.registry_path.display())))?;
        serde_json::from_str(&content)
            .map_err(|e| Error::RegistryIo(format!("parsing rule registry: {e}")))
    }

    /// Write `rules` atomically: write-to-temp, then rename (atomic on the
    /// same filesystem), then best-effort commit to version control.
    fn write_registry_atomic(&self, rules: &[Rule], commit_subject: &str) -> Result<()> {
        let serialized = serde_json::to_string_pretty(rules)
            .map_err(|e| Error::RegistryIo(format!("serializing rule registry: {e}")))?;
        let tmp_path = self.registry_path.with_extension("json.tmp");
        std::fs::write(&tmp_path, serialized)
            .map_err(|e| Error::RegistryIo(format!("writing {}: {e}", tmp_path.display())))?;
        std::fs::rename(&tmp_path, &self.registry_path)
            .map_err(|e| Error::RegistryIo(format!("renaming into {}: {e}", self.registry_path.display())))?;
        self.commit_registry_change(commit_subject);
        Ok(())
    }

    fn commit_registry_change(&self, subject: &str) {
        let Some(dir) = self.registry_path.parent() else {
            return;
        };
        let add = std::process::Command::new("git")
            .args(["add", "--"])
            .arg(&self.registry_path)
            .current_dir(dir)
            .output();
        if let Err(e) = add {
            warn!(error = %e, "git add for rule registry failed, continuing");
            return;
        }
        let commit = std::process::Command::new("git")
            .args(["commit", "-m", subject])
            .current_dir(dir)
            .output();
        if let Err(e) = commit {
            warn!(error = %e, "git commit for rule registry failed, continuing");
        }
    }

    /// Classify `text` as valid or not. LLM unavailability is treated as an
    /// invalid classification with a distinguishing reason, not an error —
    /// callers stage the rule for human review instead of rejecting it.
    pub async fn validate_rule(&self, text: &str) -> (bool, String) {
        let prompt = Prompt::new(
            "You approve short, actionable rules for a coding assistant's memory. \
             A rule is VALID if it is specific, does not contradict common engineering \
             practice, is internally coherent, and is at most 50 words. Respond with \
             exactly one word, VALID or INVALID, followed by a short reason.",
            text.to_string(),
        );
        match complete_with_timeout(self.llm.as_ref(), prompt).await {
            Ok(response) => {
                let trimmed = response.trim();
                if trimmed.to_uppercase().starts_with("VALID") {
                    (true, "passed validation".to_string())
                } else {
                    (false, trimmed.to_string())
                }
            }
            Err(e) => (false, format!("llm unavailable: {e}")),
        }
    }

    /// True iff `text` is a near-duplicate of any active rule.
    pub async fn is_duplicate(&self, text: &str, existing: &[Rule]) -> bool {
        let active: Vec<&Rule> = existing.iter().filter(|r| r.status == RuleStatus::Active).collect();
        match self.embedder.embed(text).await {
            Ok(candidate) => {
                for rule in &active {
                    if let Ok(existing_vec) = self.embedder.embed(&rule.text).await {
                        if cosine_similarity(&candidate, &existing_vec) >= self.config.deduplication_similarity {
                            return true;
                        }
                    }
                }
                false
            }
            Err(_) => {
                let normalized = text.trim().to_lowercase();
                active.iter().any(|r| r.text.trim().to_lowercase() == normalized)
            }
        }
    }

    /// `addRule` protocol: cap enforcement, dedup, validation, then either
    /// autonomous activation or staging for review.
    pub async fn add_rule(
        &self,
        text: &str,
        source: &str,
        source_session_ids: Vec<String>,
    ) -> Result<AddRuleOutcome> {
        if text.trim().is_empty() {
            return Ok(AddRuleOutcome {
                applied: false,
                reason: Some("invalid: rule text must not be empty".to_string()),
                rule_id: None,
            });
        }

        if self.config.approval_mode == ApprovalMode::ReviewOnly {
            return Ok(AddRuleOutcome {
                applied: false,
                reason: Some("review-only mode: nothing is persisted".to_string()),
                rule_id: None,
            });
        }

        let mut rules = self.read_registry()?;

        if self.is_duplicate(text, &rules).await {
            return Ok(AddRuleOutcome {
                applied: false,
                reason: Some("Duplicate of existing rule".to_string()),
                rule_id: None,
            });
        }

        let (valid, validation_reason) = self.validate_rule(text).await;
        let will_activate = matches!(self.config.approval_mode, ApprovalMode::Autonomous) && valid;

        if will_activate {
            self.enforce_cap(&mut rules)?;
        }

        let now = Utc::now();
        let id = generate_rule_id();
        let rule = Rule {
            id: id.clone(),
            text: text.to_string(),
            source: RuleSource::parse(source).as_str().to_string(),
            status: if will_activate { RuleStatus::Active } else { RuleStatus::Proposed },
            reinforcement_count: 0,
            created_at: now,
            last_reinforced: now,
            source_session_ids,
            categories: categorize::categorize_rule(text),
        };

        rules.push(rule.clone());
        self.write_registry_atomic(&rules, &format!("feat(rules): propose {id}"))?;

        if will_activate {
            self.upsert_rule_point(&rule).await?;
        }

        Ok(AddRuleOutcome {
            applied: will_activate,
            reason: if will_activate { None } else { Some(validation_reason) },
            rule_id: Some(id),
        })
    }

    fn enforce_cap(&self, rules: &mut [Rule]) -> Result<()> {
        let active_count = rules.iter().filter(|r| r.status == RuleStatus::Active).count();
        if active_count < self.config.max_active_rules {
            return Ok(());
        }
        if let Some(victim) = rules
            .iter_mut()
            .filter(|r| r.status == RuleStatus::Active)
            .min_by_key(|r| r.reinforcement_count)
        {
            victim.status = RuleStatus::Retired;
        }
        Ok(())
    }

    /// Promote every `proposed` rule that re-validates.
    pub async fn apply_pending(&self) -> Result<usize> {
        if self.config.approval_mode == ApprovalMode::ReviewOnly {
            return Ok(0);
        }

        let mut rules = self.read_registry()?;
        let mut promoted = 0;

        let proposed_indices: Vec<usize> = rules
            .iter()
            .enumerate()
            .filter(|(_, r)| r.status == RuleStatus::Proposed)
            .map(|(i, _)| i)
            .collect();

        for idx in proposed_indices {
            let text = rules[idx].text.clone();
            let (valid, _) = self.validate_rule(&text).await;
            if !valid {
                continue;
            }
            if self.is_duplicate(&text, &rules).await {
                continue;
            }
            self.enforce_cap(&mut rules)?;
            rules[idx].status = RuleStatus::Active;
            promoted += 1;
        }

        if promoted > 0 {
            self.write_registry_atomic(&rules, "feat(rules): apply pending proposals")?;
            for rule in rules.iter().filter(|r| r.status == RuleStatus::Active) {
                self.upsert_rule_point(rule).await?;
            }
        }
        Ok(promoted)
    }

    /// Enumerate active/proposed/retired rules for a human reader.
    pub fn review(&self) -> Result<RuleReview> {
        let rules = self.read_registry()?;
        let mut review = RuleReview::default();
        for rule in rules {
            match rule.status {
                RuleStatus::Active => review.active.push(rule),
                RuleStatus::Proposed => review.proposed.push(rule),
                RuleStatus::Retired => review.retired.push(rule),
                RuleStatus::Stale => review.active.push(rule),
            }
        }
        Ok(review)
    }

    /// Bulk, idempotent mirror of every active rule into the `rules`
    /// collection.
    pub async fn sync_rules_to_qdrant(&self) -> Result<usize> {
        let rules = self.read_registry()?;
        self.store
            .ensure_collection(RULES, self.embedder.dimension())
            .await?;
        let active: Vec<&Rule> = rules.iter().filter(|r| r.status == RuleStatus::Active).collect();
        for rule in &active {
            self.upsert_rule_point(rule).await?;
        }
        Ok(active.len())
    }

    async fn upsert_rule_point(&self, rule: &Rule) -> Result<()> {
        let vector = self.embedder.embed(&rule.text).await?;
        let mut payload = HashMap::new();
        payload.insert("text".to_string(), json!(rule.text));
        payload.insert("status".to_string(), json!("active"));
        payload.insert("source".to_string(), json!(rule.source));
        payload.insert("categories".to_string(), json!(rule.categories));
        payload.insert("reinforcementCount".to_string(), json!(rule.reinforcement_count));
        payload.insert("createdAt".to_string(), json!(rule.created_at.to_rfc3339()));
        self.store
            .upsert(RULES, Point::new(rule.id.clone(), vector, payload))
            .await
    }

    /// Read-only access to the on-disk registry, for the reinforcement
    /// tracker and CLI commands.
    pub fn load_rules(&self) -> Result<Vec<Rule>> {
        self.read_registry()
    }

    /// Persist an externally-mutated rule set (used by the reinforcement
    /// tracker, which owns `reinforcementCount`/`lastReinforced`/status
    /// transitions on existing rules rather than proposing new ones).
    pub fn save_rules(&self, rules: &[Rule], commit_subject: &str) -> Result<()> {
        self.write_registry_atomic(rules, commit_subject)
    }

    /// Best-effort delete of retired-but-still-mirrored rule ids.
    pub async fn delete_from_mirror(&self, ids: &[String]) -> Result<()> {
        self.store.delete(RULES, ids).await
    }

    /// Path to the registry file this manager reads and writes.
    #[must_use]
    pub fn registry_path(&self) -> &Path {
        &self.registry_path
    }
}
