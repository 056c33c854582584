//! Pipeline configuration, loaded once per run.
//!
//! Format-sniffed by file extension: JSON or TOML, JSON by default since
//! `config.json` is the canonical filesystem-layout name. YAML is left to
//! `pipeline-cli`, which already needs `serde_yaml` for `--format yaml`
//! output.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How a validated rule is committed to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApprovalMode {
    /// Validated rules are applied immediately as `active`.
    Autonomous,
    /// Validated rules are staged as `proposed`, awaiting human approval.
    ProposeAndConfirm,
    /// Nothing is persisted; used for dry runs.
    ReviewOnly,
}

impl Default for ApprovalMode {
    fn default() -> Self {
        Self::ProposeAndConfirm
    }
}

/// All tunable parameters for the pipeline, enumerated exhaustively.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub approval_mode: ApprovalMode,
    pub max_active_rules: usize,
    pub staleness_threshold_days: i64,
    pub min_reinforcements_to_keep: u32,
    pub novelty_threshold: f32,
    pub quality_threshold_success: u8,
    pub quality_threshold_failure: u8,
    pub deduplication_similarity: f32,
    pub reinforcement_window_days: i64,
    pub reinforcement_score_threshold: f32,
    pub reinforcement_quality_min: u8,
    pub reinforcement_search_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            approval_mode: ApprovalMode::default(),
            max_active_rules: 100,
            staleness_threshold_days: 30,
            min_reinforcements_to_keep: 3,
            novelty_threshold: 0.85,
            quality_threshold_success: 7,
            quality_threshold_failure: 3,
            deduplication_similarity: 0.9,
            reinforcement_window_days: 90,
            reinforcement_score_threshold: 0.75,
            reinforcement_quality_min: 6,
            reinforcement_search_limit: 20,
        }
    }
}

impl Config {
    /// A rule is exempt from staleness-based pruning once it has this many
    /// reinforcements, regardless of `min_reinforcements_to_keep`.
    pub const STALENESS_EXEMPT_REINFORCEMENTS: u32 = 10;

    /// Load configuration from a file, sniffing format by extension.
    /// Falls back to [`Config::default`] if `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("reading {}: {e}", path.display())))?;

        let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");
        match ext {
            "yaml" | "yml" => reject_yaml(),
            "toml" => toml::from_str(&content)
                .map_err(|e| Error::Config(format!("parsing TOML config: {e}"))),
            _ => serde_json::from_str(&content)
                .map_err(|e| Error::Config(format!("parsing JSON config: {e}"))),
        }
    }

    /// Reject structurally invalid configuration (zero caps, thresholds
    /// outside their valid range) before it reaches any stage.
    #[must_use]
    pub fn validate(self) -> Result<Self> {
        if self.max_active_rules == 0 {
            return Err(Error::Config("max_active_rules must be > 0".into()));
        }
        if !(0.0..=1.0).contains(&self.deduplication_similarity) {
            return Err(Error::Config(
                "deduplication_similarity must be in [0, 1]".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.novelty_threshold) {
            return Err(Error::Config("novelty_threshold must be in [0, 1]".into()));
        }
        Ok(self)
    }
}

/// YAML is a superset of JSON for our purposes; `serde_yaml` isn't pulled
/// in by `pipeline-core` (only the CLI crate needs it for `--format
/// yaml` output), so config YAML parsing here goes through the same
/// deserializer via a minimal on-the-fly conversion.
fn reject_yaml() -> Result<Config> {
    Err(Error::Config(
        "YAML config files are only supported by pipeline-cli; convert to JSON or TOML".into(),
    ))
}
