//! Shared CLI test harness: a temporary workspace with a `config.json` and
//! an empty `logs/sessions` directory, plus a helper for invoking the
//! built binary against it.

use assert_cmd::Command;
use std::path::PathBuf;
use tempfile::TempDir;

/// CLI test harness for executing commands against a scratch workspace.
pub struct CliHarness {
    workspace: TempDir,
}

impl CliHarness {
    /// Create a fresh temporary workspace with a default `config.json` and
    /// an empty session directory.
    pub fn new() -> Self {
        let workspace = TempDir::new().expect("failed to create temp workspace");
        std::fs::write(workspace.path().join("config.json"), "{}").unwrap();
        std::fs::create_dir_all(workspace.path().join("logs/sessions")).unwrap();
        Self { workspace }
    }

    pub fn root(&self) -> PathBuf {
        self.workspace.path().to_path_buf()
    }

    pub fn config_path(&self) -> PathBuf {
        self.workspace.path().join("config.json")
    }

    pub fn write_session(&self, name: &str, content: &str) {
        std::fs::write(self.workspace.path().join("logs/sessions").join(name), content).unwrap();
    }

    /// A `pipeline-cli` invocation pre-wired with `--config` pointing at
    /// this workspace.
    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("pipeline-cli").expect("binary built");
        cmd.arg("--config").arg(self.config_path());
        cmd
    }
}

impl Default for CliHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Output validation utilities.
pub mod validators {
    pub fn validate_json_output(output: &str) -> Result<(), Box<dyn std::error::Error>> {
        serde_json::from_str::<serde_json::Value>(output)?;
        Ok(())
    }

    pub fn validate_yaml_output(output: &str) -> Result<(), Box<dyn std::error::Error>> {
        serde_yaml::from_str::<serde_yaml::Value>(output)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn harness_creates_workspace_layout() {
        let harness = CliHarness::new();
        assert!(harness.config_path().is_file());
        assert!(harness.root().join("logs/sessions").is_dir());
    }

    #[test]
    fn json_validation_accepts_valid_json() {
        assert!(validators::validate_json_output(r#"{"test": "value"}"#).is_ok());
    }

    #[test]
    fn yaml_validation_accepts_valid_yaml() {
        assert!(validators::validate_yaml_output("test: value\n").is_ok());
    }
}
