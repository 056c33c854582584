use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;
mod errors;
mod output;

use output::OutputFormat;

#[derive(Parser)]
#[command(name = "pipeline-cli")]
#[command(about = "Drives the self-improvement pipeline: ingest, score, extract, reflect, propose, reinforce, prune, sync")]
#[command(version, long_about = None)]
struct Cli {
    /// Path to config.json/.toml. Defaults to discovering a workspace root.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Human)]
    format: OutputFormat,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline: ingest, then every downstream stage in order.
    Ingest {
        /// Session directory; defaults to `logs/sessions` under the workspace root.
        dir: Option<PathBuf>,
        /// Stop after ingestion; skip scoring and every later stage.
        #[arg(long)]
        embed_only: bool,
        /// Drop and recreate the `sessions` collection before ingesting.
        #[arg(long)]
        rebuild: bool,
        /// Reserved for parity with the orchestrator's external interface;
        /// this implementation has no backup step to skip.
        #[arg(long)]
        no_backup: bool,
    },
    /// Print vector-store and rule-registry counters.
    Stats,
    /// Score unscored `sessions` chunks.
    Score {
        /// Only score chunks from this session.
        #[arg(long)]
        session_id: Option<String>,
        /// Re-score chunks that already have a quality_score.
        #[arg(long)]
        rescore: bool,
        /// Mark chunks pending instead of scoring them (fast-shutdown mode).
        #[arg(long)]
        pending: bool,
    },
    /// Mine candidate rules from scored chunks.
    ExtractInsights,
    /// Scan sessions for failure signals and produce reflections.
    GenerateReflections {
        dir: Option<PathBuf>,
    },
    /// Scan sessions for novel successes and stage skill candidates.
    ProposeSkills {
        dir: Option<PathBuf>,
    },
    /// Scan active rules for reinforcing evidence in `sessions`.
    Reinforce,
    /// Retire stale active rules.
    Prune,
    /// Mirror active rules into the `rules` collection.
    Sync,
    /// Validate the loaded configuration.
    Config,
    /// Generate a shell completion script.
    Completion {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).init();

    let rt = config::load_runtime(cli.config.as_deref())?;

    match cli.command {
        Commands::Ingest { dir, embed_only, rebuild, no_backup: _ } => {
            commands::ingest(&rt, dir.as_deref(), embed_only, rebuild, &cli.format).await
        }
        Commands::Stats => commands::stats(&rt, &cli.format).await,
        Commands::Score { session_id, rescore, pending } => {
            commands::score(&rt, session_id.as_deref(), rescore, pending, &cli.format).await
        }
        Commands::ExtractInsights => commands::extract_insights(&rt, &cli.format).await,
        Commands::GenerateReflections { dir } => {
            commands::generate_reflections(&rt, dir.as_deref(), &cli.format).await
        }
        Commands::ProposeSkills { dir } => {
            commands::propose_skills(&rt, dir.as_deref(), &cli.format).await
        }
        Commands::Reinforce => commands::reinforce(&rt, &cli.format).await,
        Commands::Prune => commands::prune(&rt, &cli.format).await,
        Commands::Sync => commands::sync(&rt, &cli.format).await,
        Commands::Config => commands::config_validate(&rt, &cli.format),
        Commands::Completion { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "pipeline-cli", &mut std::io::stdout());
            Ok(())
        }
    }
}
