//! # Pipeline CLI
//!
//! Thin command-line driver over `pipeline-core`: wires a workspace's
//! config, vector store, embedder, and LLM client together and dispatches
//! to one pipeline stage per subcommand.

pub mod commands;
pub mod config;
pub mod errors;
pub mod output;
pub mod test_utils;
