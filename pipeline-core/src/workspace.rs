//! Workspace-root discovery.
//!
//! The pipeline operates against a filesystem layout rooted at a single
//! directory. Discovery runs once per process and is cached: compute once,
//! reuse everywhere, no explicit teardown.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::constants::paths;

static WORKSPACE_ROOT: OnceLock<PathBuf> = OnceLock::new();

/// Resolve the workspace root for this process.
///
/// Resolution order: `WORKSPACE_ROOT` env var, then walking up from the
/// current directory looking for a `config.json` marker, then the current
/// directory itself. Cached after the first call.
pub fn resolve() -> &'static Path {
    WORKSPACE_ROOT.get_or_init(discover).as_path()
}

/// Resolve starting from an explicit directory instead of `cwd`, without
/// touching the process-wide cache. Used by tests and by CLI invocations
/// that take an explicit session directory argument.
pub fn resolve_from(start: &Path) -> PathBuf {
    if let Ok(env_root) = std::env::var("WORKSPACE_ROOT") {
        return PathBuf::from(env_root);
    }
    walk_up(start).unwrap_or_else(|| start.to_path_buf())
}

fn discover() -> PathBuf {
    if let Ok(env_root) = std::env::var("WORKSPACE_ROOT") {
        return PathBuf::from(env_root);
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    walk_up(&cwd).unwrap_or(cwd)
}

fn walk_up(start: &Path) -> Option<PathBuf> {
    let mut dir = Some(start);
    while let Some(d) = dir {
        if d.join(paths::CONFIG_FILE).is_file() {
            return Some(d.to_path_buf());
        }
        dir = d.parent();
    }
    None
}

/// Convenience accessors for the well-known sub-paths under a workspace root.
pub struct Layout<'a> {
    root: &'a Path,
}

impl<'a> Layout<'a> {
    #[must_use]
    pub fn new(root: &'a Path) -> Self {
        Self { root }
    }

    #[must_use]
    pub fn sessions_dir(&self) -> PathBuf {
        self.root.join(paths::SESSIONS_DIR)
    }

    #[must_use]
    pub fn rules_file(&self) -> PathBuf {
        self.root.join(paths::RULES_FILE)
    }

    #[must_use]
    pub fn reflection_ledger_file(&self) -> PathBuf {
        self.root.join(paths::REFLECTION_LEDGER_FILE)
    }

    #[must_use]
    pub fn skill_ledger_file(&self) -> PathBuf {
        self.root.join(paths::SKILL_LEDGER_FILE)
    }

    #[must_use]
    pub fn config_file(&self) -> PathBuf {
        self.root.join(paths::CONFIG_FILE)
    }

    #[must_use]
    pub fn skill_candidates_dir(&self) -> PathBuf {
        self.root.join(paths::SKILL_CANDIDATES_DIR)
    }

    #[must_use]
    pub fn skills_dir(&self) -> PathBuf {
        self.root.join(paths::SKILLS_DIR)
    }

    #[must_use]
    pub fn dashboard_file(&self) -> PathBuf {
        self.root.join(paths::DASHBOARD_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walk_up_finds_marker() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.json"), "{}").unwrap();
        let nested = dir.path().join("a/b/c");
        std::fs::create_dir_all(&nested).unwrap();
        let found = walk_up(&nested).unwrap();
        assert_eq!(found, dir.path());
    }

    #[test]
    fn walk_up_returns_none_without_marker() {
        let dir = tempfile::tempdir().unwrap();
        assert!(walk_up(dir.path()).is_none());
    }

    #[test]
    fn layout_joins_paths_under_root() {
        let root = Path::new("/ws");
        let layout = Layout::new(root);
        assert_eq!(layout.rules_file(), Path::new("/ws/rules.json"));
        assert_eq!(
            layout.sessions_dir(),
            Path::new("/ws/logs/sessions")
        );
    }
}
