//! Drives the stage pipeline end to end: ingest, score, extract, reflect,
//! propose skills, reinforce, prune, sync, then emit a summary.

use std::collections::HashMap;
use std::path::Path;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::error;

use crate::chunk::Chunker;
use crate::config::Config;
use crate::constants::collections::RULES;
use crate::embeddings::Embedder;
use crate::error::Result;
use crate::insight::InsightExtractor;
use crate::ledger::ProcessingLedger;
use crate::llm::SharedLLMClient;
use crate::quality::{QualityScorer, ScoreSelection};
use crate::reflection::ReflectionGenerator;
use crate::reinforcement::ReinforcementTracker;
use crate::rules::ProposalManager;
use crate::session::{ingestor::SessionIngestor, parse_session_file};
use crate::skill::SkillGenerator;
use crate::vector_store::VectorStore;
use crate::workspace::Layout;

/// Outcome of one stage: either its own summary counters, serialized to
/// JSON, or an error message the stage isolation boundary caught.
#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub stage: String,
    pub duration: Duration,
    pub outcome: StageOutcome,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum StageOutcome {
    Ok { detail: serde_json::Value },
    Skipped { reason: String },
}

/// The full run summary, written to `visualizations/dashboard-data.json`.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardData {
    pub generated_at: chrono::DateTime<chrono::Utc>,
    pub stages: Vec<StageReport>,
}

/// Drives stages 1-8 of the pipeline.
pub struct Orchestrator<'a> {
    store: &'a dyn VectorStore,
    llm: &'a SharedLLMClient,
    embedder: &'a std::sync::Arc<dyn Embedder>,
    config: &'a Config,
    workspace_root: &'a Path,
}

impl<'a> Orchestrator<'a> {
    #[must_use]
    pub fn new(
        store: &'a dyn VectorStore,
        llm: &'a SharedLLMClient,
        embedder: &'a std::sync::Arc<dyn Embedder>,
        config: &'a Config,
        workspace_root: &'a Path,
    ) -> Self {
        Self {
            store,
            llm,
            embedder,
            config,
            workspace_root,
        }
    }

    fn layout(&self) -> Layout<'a> {
        Layout::new(self.workspace_root)
    }

    fn proposals(&self) -> ProposalManager<'a> {
        ProposalManager::new(
            self.store,
            self.llm,
            self.embedder,
            self.config,
            self.layout().rules_file(),
        )
    }

    /// Run the full pipeline. `embed_only` stops after ingestion.
    pub async fn run(&self, session_dir: &Path, embed_only: bool) -> Result<DashboardData> {
        let mut stages = Vec::new();

        stages.push(self.run_stage("ingest", || self.ingest(session_dir)).await);
        if embed_only {
            return Ok(DashboardData {
                generated_at: chrono::Utc::now(),
                stages,
            });
        }

        stages.push(self.run_stage("score", || self.score()).await);
        stages.push(self.run_stage("extract-insights", || self.extract_insights()).await);
        stages.push(self.run_stage("generate-reflections", || self.generate_reflections(session_dir)).await);
        stages.push(self.run_stage("propose-skills", || self.propose_skills(session_dir)).await);
        stages.push(self.run_stage("reinforce", || self.reinforce()).await);
        stages.push(self.run_stage("prune", || self.prune()).await);
        stages.push(self.run_stage("sync", || self.sync()).await);

        let dashboard = DashboardData {
            generated_at: chrono::Utc::now(),
            stages,
        };
        self.write_dashboard(&dashboard)?;
        Ok(dashboard)
    }

    async fn run_stage<F, Fut>(&self, name: &str, f: F) -> StageReport
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<serde_json::Value>>,
    {
        let start = Instant::now();
        let outcome = match f().await {
            Ok(detail) => StageOutcome::Ok { detail },
            Err(e) => {
                error!(stage = name, error = %e, "stage failed, continuing with remaining stages");
                StageOutcome::Skipped { reason: e.to_string() }
            }
        };
        StageReport {
            stage: name.to_string(),
            duration: start.elapsed(),
            outcome,
        }
    }

    async fn ingest(&self, session_dir: &Path) -> Result<serde_json::Value> {
        let ingestor = SessionIngestor::new(self.store, self.embedder, Chunker::default());
        let summary = ingestor.ingest_dir(session_dir).await?;
        Ok(serde_json::json!({
            "processed": summary.processed,
            "skipped": summary.skipped,
            "errors": summary.errors,
            "chunks_upserted": summary.chunks_upserted,
        }))
    }

    async fn score(&self) -> Result<serde_json::Value> {
        let scorer = QualityScorer::new(self.store, self.llm);
        let summary = scorer.score(&ScoreSelection::default()).await?;
        Ok(serde_json::json!({ "heuristic": summary.heuristic, "llm": summary.llm }))
    }

    async fn extract_insights(&self) -> Result<serde_json::Value> {
        let proposals = self.proposals();
        let extractor = InsightExtractor::new(self.store, self.llm, self.config);
        let proposed = extractor.run(&proposals).await?;
        Ok(serde_json::json!({ "proposed": proposed }))
    }

    async fn generate_reflections(&self, session_dir: &Path) -> Result<serde_json::Value> {
        let proposals = self.proposals();
        let generator = ReflectionGenerator::new(self.store, self.llm, self.embedder);
        let mut ledger = ProcessingLedger::load(self.layout().reflection_ledger_file())?;
        let mut produced = 0;

        for (session_id, messages) in self.iter_session_messages(session_dir) {
            produced += generator
                .process_session(&session_id, &messages, &mut ledger, &proposals)
                .await?;
        }
        Ok(serde_json::json!({ "reflections_produced": produced }))
    }

    async fn propose_skills(&self, session_dir: &Path) -> Result<serde_json::Value> {
        let generator = SkillGenerator::new(self.store, self.llm, self.embedder, self.config, self.layout());
        let mut ledger = ProcessingLedger::load(self.layout().skill_ledger_file())?;
        let mut produced = 0;

        for (session_id, messages) in self.iter_session_messages(session_dir) {
            if generator
                .process_session(&session_id, &messages, &mut ledger)
                .await?
                .is_some()
            {
                produced += 1;
            }
        }
        Ok(serde_json::json!({ "candidates_produced": produced }))
    }

    async fn reinforce(&self) -> Result<serde_json::Value> {
        let proposals = self.proposals();
        let tracker = ReinforcementTracker::new(self.store, self.embedder, self.config);
        let summary = tracker.scan(&proposals).await?;
        Ok(serde_json::json!({
            "rules_reinforced": summary.rules_reinforced,
            "total_reinforcements": summary.total_reinforcements,
        }))
    }

    async fn prune(&self) -> Result<serde_json::Value> {
        let proposals = self.proposals();
        let tracker = ReinforcementTracker::new(self.store, self.embedder, self.config);
        let summary = tracker.prune(&proposals).await?;
        Ok(serde_json::json!({ "retired": summary.retired, "aging": summary.aging }))
    }

    async fn sync(&self) -> Result<serde_json::Value> {
        let proposals = self.proposals();
        let synced = proposals.sync_rules_to_qdrant().await?;
        let total = self.store.count(RULES).await.unwrap_or(synced);
        Ok(serde_json::json!({ "synced": synced, "total_in_mirror": total }))
    }

    fn iter_session_messages(
        &self,
        session_dir: &Path,
    ) -> Vec<(String, Vec<crate::session::SessionMessage>)> {
        let Ok(entries) = std::fs::read_dir(session_dir) else {
            return Vec::new();
        };
        entries
            .filter_map(std::result::Result::ok)
            .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("json"))
            .filter_map(|e| {
                let path = e.path();
                let session_id = path.file_stem()?.to_str()?.to_string();
                let raw = std::fs::read_to_string(&path).ok()?;
                let messages = parse_session_file(&raw).ok()?;
                Some((session_id, messages))
            })
            .collect()
    }

    fn write_dashboard(&self, dashboard: &DashboardData) -> Result<()> {
        let path = self.layout().dashboard_file();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let serialized = serde_json::to_string_pretty(dashboard)
            .map_err(|e| crate::error::Error::Parse(format!("serializing dashboard data: {e}")))?;
        std::fs::write(path, serialized)?;
        Ok(())
    }

    /// Print a human-readable summary table of `dashboard` to stdout.
    #[must_use]
    pub fn summary_table(dashboard: &DashboardData) -> String {
        let mut table = String::from("stage                  status    duration\n");
        for report in &dashboard.stages {
            let status = match &report.outcome {
                StageOutcome::Ok { .. } => "ok",
                StageOutcome::Skipped { .. } => "skipped",
            };
            table.push_str(&format!(
                "{:<22}  {:<8}  {:>6.2}s\n",
                report.stage,
                status,
                report.duration.as_secs_f64()
            ));
        }
        table
    }
}

/// Counters rolled up per stage, used by `pipeline-cli stats`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Counters(pub HashMap<String, usize>);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashingEmbedder;
    use crate::llm::StubLLMClient;
    use crate::vector_store::memory::InMemoryStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn embed_only_stops_after_ingestion() {
        let dir = tempfile::tempdir().unwrap();
        let sessions_dir = dir.path().join("logs/sessions");
        std::fs::create_dir_all(&sessions_dir).unwrap();
        std::fs::write(
            sessions_dir.join("s1.json"),
            r#"{"messages": [{"role": "user", "content": "please help debug this crash"}]}"#,
        )
        .unwrap();

        let store = InMemoryStore::new();
        let llm: SharedLLMClient = Arc::new(StubLLMClient::new("[]"));
        let embedder = Arc::new(HashingEmbedder::new()) as Arc<dyn Embedder>;
        let config = Config::default();
        let orchestrator = Orchestrator::new(&store, &llm, &embedder, &config, dir.path());

        let dashboard = orchestrator.run(&sessions_dir, true).await.unwrap();
        assert_eq!(dashboard.stages.len(), 1);
        assert_eq!(dashboard.stages[0].stage, "ingest");
    }

    #[tokio::test]
    async fn full_run_executes_every_stage_and_writes_dashboard() {
        let dir = tempfile::tempdir().unwrap();
        let sessions_dir = dir.path().join("logs/sessions");
        std::fs::create_dir_all(&sessions_dir).unwrap();
        std::fs::write(
            sessions_dir.join("s1.json"),
            r#"{"messages": [
                {"role": "user", "content": "investigate why the deploy keeps failing"},
                {"role": "assistant", "content": "error: deploy failed due to a stale config value"}
            ]}"#,
        )
        .unwrap();

        let store = InMemoryStore::new();
        let llm: SharedLLMClient = Arc::new(StubLLMClient::new("[5]"));
        let embedder = Arc::new(HashingEmbedder::new()) as Arc<dyn Embedder>;
        let config = Config::default();
        let orchestrator = Orchestrator::new(&store, &llm, &embedder, &config, dir.path());

        let dashboard = orchestrator.run(&sessions_dir, false).await.unwrap();
        assert_eq!(dashboard.stages.len(), 8);
        assert!(dir.path().join("visualizations/dashboard-data.json").exists());
    }
}
