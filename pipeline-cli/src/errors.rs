//! Enhanced error handling for pipeline-cli.
//!
//! Provides helpful error messages with context and suggestions for common
//! issues operators hit when running the pipeline against a workspace.

use anyhow::Result;
use colored::Colorize;

/// Adds helpful context and suggestions to a fallible result.
pub trait EnhancedError<T> {
    fn context_with_help(self, msg: &str, help: &[&str]) -> Result<T>;
}

impl<T, E: std::error::Error + Send + Sync + 'static> EnhancedError<T> for Result<T, E> {
    fn context_with_help(self, msg: &str, help: &[&str]) -> Result<T> {
        self.map_err(|e| {
            let mut error_msg = format!("{}\n\n{}", msg.red().bold(), e);

            if !help.is_empty() {
                error_msg.push_str(&format!("\n\n{}", "Possible solutions:".yellow().bold()));
                for (i, h) in help.iter().enumerate() {
                    error_msg.push_str(&format!("\n  {}. {}", i + 1, h));
                }
            }

            anyhow::anyhow!(error_msg)
        })
    }
}

/// Common error messages and help text.
pub mod helpers {
    pub const WORKSPACE_NOT_FOUND_HELP: &[&str] = &[
        "Run from inside the target workspace, or pass --config <path>",
        "Set WORKSPACE_ROOT to the workspace directory",
        "Check that config.json exists at the workspace root",
    ];

    pub const SESSION_DIR_HELP: &[&str] = &[
        "Pass an explicit session directory: pipeline-cli ingest <dir>",
        "Default session directory is logs/sessions under the workspace root",
        "Check file permissions on the session directory",
    ];

    pub const VECTOR_STORE_HELP: &[&str] = &[
        "Set QDRANT_URL if running against a real Qdrant instance",
        "Build with --features qdrant to enable the Qdrant-backed store",
        "Without QDRANT_URL, an in-process store is used for this run only",
    ];

    pub const CONFIG_ERROR_HELP: &[&str] = &[
        "Check config.json at the workspace root",
        "Verify all required fields are present and within range",
        "Run 'pipeline-cli config validate' to check your configuration",
    ];

    pub fn format_error_message(error: &str, context: &str, help: &[&str]) -> String {
        let mut msg = format!("{}\n\n{}", context.red().bold(), error);
        if !help.is_empty() {
            msg.push_str(&format!("\n\n{}", "Possible solutions:".yellow().bold()));
            for (i, h) in help.iter().enumerate() {
                msg.push_str(&format!("\n  {}. {}", i + 1, h));
            }
        }
        msg
    }
}
