#![allow(clippy::cast_precision_loss)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_docs_in_private_items)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::unused_self)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::assigning_clones)]
#![allow(clippy::borrowed_box)]
#![allow(clippy::float_cmp)]
#![allow(clippy::ref_option)]

//! # Pipeline Core
//!
//! A self-improvement pipeline for a coding-assistant workspace: it
//! ingests transcripts of prior assistant sessions, turns them into a
//! searchable semantic memory, and mines that memory for three kinds of
//! durable artifacts:
//!
//! - **Rules** — short actionable guidelines surfaced back into the
//!   assistant's context, governed by a propose → validate → activate →
//!   reinforce → retire lifecycle ([`rules`]).
//! - **Reflections** — root-cause notes extracted from detected failures
//!   ([`reflection`]).
//! - **Skill candidates** — reusable procedure templates derived from
//!   novel successes ([`skill`]).
//!
//! ## Module organization
//!
//! - [`embeddings`]: deterministic text -> 384-dim vector pipeline.
//! - [`vector_store`]: the `sessions`/`reflections`/`rules` collections.
//! - [`chunk`]: transcript chunking.
//! - [`session`]: session file parsing and bulk ingestion.
//! - [`quality`]: heuristic + LLM chunk scoring.
//! - [`insight`]: contrastive rule mining from scored chunks.
//! - [`reflection`]: failure-signal detection and reflection extraction.
//! - [`skill`]: skill-candidate generation.
//! - [`rules`]: the rule registry and its lifecycle.
//! - [`reinforcement`]: reinforcement scanning and staleness pruning.
//! - [`orchestrator`]: drives the stages end to end.
//! - [`llm`]: the LLM client trait and lenient response parsing.
//! - [`config`], [`constants`], [`workspace`]: ambient configuration.
//! - [`error`], [`retry`]: error taxonomy and retry policy.
//! - [`ledger`]: at-most-once processing ledgers.

pub mod chunk;
pub mod config;
pub mod constants;
pub mod embeddings;
pub mod error;
pub mod insight;
pub mod ledger;
pub mod llm;
pub mod orchestrator;
pub mod quality;
pub mod reflection;
pub mod reinforcement;
pub mod retry;
pub mod rules;
pub mod session;
pub mod skill;
pub mod vector_store;
pub mod workspace;

pub use config::Config;
pub use error::{Error, Result};
pub use orchestrator::Orchestrator;
pub use rules::{ProposalManager, Rule, RuleStatus};
