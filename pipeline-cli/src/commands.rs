//! Command implementations: one function per CLI subcommand, each
//! constructing the pieces it needs from a [`Runtime`] and printing a
//! `serde`-serializable result through the chosen [`OutputFormat`].

use serde::Serialize;

use pipeline_core::config::Config;
use pipeline_core::insight::InsightExtractor;
use pipeline_core::ledger::ProcessingLedger;
use pipeline_core::orchestrator::Orchestrator;
use pipeline_core::quality::{QualityScorer, ScoreSelection};
use pipeline_core::reflection::ReflectionGenerator;
use pipeline_core::reinforcement::ReinforcementTracker;
use pipeline_core::rules::ProposalManager;
use pipeline_core::session::parse_session_file;
use pipeline_core::skill::SkillGenerator;
use pipeline_core::constants::collections::{REFLECTIONS, RULES, SESSIONS};

use crate::config::Runtime;
use crate::output::OutputFormat;

fn proposals<'a>(rt: &'a Runtime) -> ProposalManager<'a> {
    let layout = pipeline_core::workspace::Layout::new(&rt.workspace_root);
    ProposalManager::new(
        rt.store.as_ref(),
        &rt.llm,
        &rt.embedder,
        &rt.config,
        layout.rules_file(),
    )
}

fn session_dir(rt: &Runtime, explicit: Option<&std::path::Path>) -> std::path::PathBuf {
    explicit.map(std::path::Path::to_path_buf).unwrap_or_else(|| {
        pipeline_core::workspace::Layout::new(&rt.workspace_root).sessions_dir()
    })
}

fn iter_session_messages(
    dir: &std::path::Path,
) -> Vec<(String, Vec<pipeline_core::session::SessionMessage>)> {
    let Ok(entries) = std::fs::read_dir(dir) else {
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

#[derive(Serialize)]
struct SimpleReport(serde_json::Value);

impl crate::output::Output for SimpleReport {
    fn write_human<W: std::io::Write>(&self, mut writer: W) -> anyhow::Result<()> {
        writeln!(writer, "{}", serde_json::to_string_pretty(&self.0)?)?;
        Ok(())
    }
}

pub async fn ingest(
    rt: &Runtime,
    dir: Option<&std::path::Path>,
    embed_only: bool,
    rebuild: bool,
    format: &OutputFormat,
) -> anyhow::Result<()> {
    let dir = session_dir(rt, dir);
    if rebuild {
        let existing = rt.store.scroll(SESSIONS, None).await.unwrap_or_default();
        let ids: Vec<String> = existing.into_iter().map(|p| p.id).collect();
        if !ids.is_empty() {
            rt.store.delete(SESSIONS, &ids).await.ok();
        }
        rt.store.ensure_collection(SESSIONS, rt.embedder.dimension()).await?;
    }
    let orchestrator = Orchestrator::new(
        rt.store.as_ref(),
        &rt.llm,
        &rt.embedder,
        &rt.config,
        &rt.workspace_root,
    );
    let dashboard = orchestrator.run(&dir, embed_only).await?;
    match format {
        OutputFormat::Human => print!("{}", Orchestrator::summary_table(&dashboard)),
        _ => format.print_output(&SimpleReport(serde_json::to_value(&dashboard)?))?,
    }
    Ok(())
}

pub async fn stats(rt: &Runtime, format: &OutputFormat) -> anyhow::Result<()> {
    let sessions = rt.store.count(SESSIONS).await.unwrap_or(0);
    let reflections = rt.store.count(REFLECTIONS).await.unwrap_or(0);
    let rules_mirror = rt.store.count(RULES).await.unwrap_or(0);
    let proposals = proposals(rt);
    let registry = proposals.load_rules().unwrap_or_default();
    let active = registry
        .iter()
        .filter(|r| r.status == pipeline_core::rules::RuleStatus::Active)
        .count();

    let report = serde_json::json!({
        "sessions_chunks": sessions,
        "reflections": reflections,
        "rules_in_mirror": rules_mirror,
        "rules_in_registry": registry.len(),
        "rules_active": active,
    });
    format.print_output(&SimpleReport(report))
}

pub async fn score(rt: &Runtime, session_id: Option<&str>, rescore: bool, pending: bool, format: &OutputFormat) -> anyhow::Result<()> {
    let scorer = QualityScorer::new(rt.store.as_ref(), &rt.llm);
    let selection = ScoreSelection {
        rescore,
        session_id: session_id.map(str::to_string),
        pending_only: pending,
    };
    let report = if pending {
        let marked = scorer.mark_pending(&selection).await?;
        serde_json::json!({ "marked_pending": marked })
    } else {
        let summary = scorer.score(&selection).await?;
        serde_json::json!({ "heuristic": summary.heuristic, "llm": summary.llm })
    };
    format.print_output(&SimpleReport(report))
}

pub async fn extract_insights(rt: &Runtime, format: &OutputFormat) -> anyhow::Result<()> {
    let proposals = proposals(rt);
    let extractor = InsightExtractor::new(rt.store.as_ref(), &rt.llm, &rt.config);
    let proposed = extractor.run(&proposals).await?;
    format.print_output(&SimpleReport(serde_json::json!({ "proposed": proposed })))
}

pub async fn generate_reflections(rt: &Runtime, dir: Option<&std::path::Path>, format: &OutputFormat) -> anyhow::Result<()> {
    let proposals = proposals(rt);
    let generator = ReflectionGenerator::new(rt.store.as_ref(), &rt.llm, &rt.embedder);
    let layout = pipeline_core::workspace::Layout::new(&rt.workspace_root);
    let mut ledger = ProcessingLedger::load(layout.reflection_ledger_file())?;
    let dir = session_dir(rt, dir);

    let mut produced = 0;
    for (session_id, messages) in iter_session_messages(&dir) {
        produced += generator
            .process_session(&session_id, &messages, &mut ledger, &proposals)
            .await?;
    }
    format.print_output(&SimpleReport(serde_json::json!({ "reflections_produced": produced })))
}

pub async fn propose_skills(rt: &Runtime, dir: Option<&std::path::Path>, format: &OutputFormat) -> anyhow::Result<()> {
    let layout = pipeline_core::workspace::Layout::new(&rt.workspace_root);
    let generator = SkillGenerator::new(rt.store.as_ref(), &rt.llm, &rt.embedder, &rt.config, layout);
    let layout = pipeline_core::workspace::Layout::new(&rt.workspace_root);
    let mut ledger = ProcessingLedger::load(layout.skill_ledger_file())?;
    let dir = session_dir(rt, dir);

    let mut produced = 0;
    for (session_id, messages) in iter_session_messages(&dir) {
        if generator
            .process_session(&session_id, &messages, &mut ledger)
            .await?
            .is_some()
        {
            produced += 1;
        }
    }
    format.print_output(&SimpleReport(serde_json::json!({ "candidates_produced": produced })))
}

pub async fn reinforce(rt: &Runtime, format: &OutputFormat) -> anyhow::Result<()> {
    let proposals = proposals(rt);
    let tracker = ReinforcementTracker::new(rt.store.as_ref(), &rt.embedder, &rt.config);
    let summary = tracker.scan(&proposals).await?;
    format.print_output(&SimpleReport(serde_json::json!({
        "rules_reinforced": summary.rules_reinforced,
        "total_reinforcements": summary.total_reinforcements,
    })))
}

pub async fn prune(rt: &Runtime, format: &OutputFormat) -> anyhow::Result<()> {
    let proposals = proposals(rt);
    let tracker = ReinforcementTracker::new(rt.store.as_ref(), &rt.embedder, &rt.config);
    let summary = tracker.prune(&proposals).await?;
    format.print_output(&SimpleReport(serde_json::json!({
        "retired": summary.retired,
        "aging": summary.aging,
    })))
}

pub async fn sync(rt: &Runtime, format: &OutputFormat) -> anyhow::Result<()> {
    let proposals = proposals(rt);
    let synced = proposals.sync_rules_to_qdrant().await?;
    format.print_output(&SimpleReport(serde_json::json!({ "synced": synced })))
}

pub fn config_validate(rt: &Runtime, format: &OutputFormat) -> anyhow::Result<()> {
    let _: &Config = &rt.config;
    format.print_output(&SimpleReport(serde_json::json!({ "valid": true })))
}
