//! Processing ledgers: on-disk records of which sessions a stage has
//! already considered, enforcing at-most-once processing.
//!
//! Single-process assumption: a read-modify-write round trip per call
//! needs no locking. Multi-process safety would need a file lock on the
//! ledger; out of scope here.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One ledger row: when a session was considered, and whether it produced
/// an artifact (a reflection, a skill candidate).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub processed_at: DateTime<Utc>,
    pub produced: bool,
}

/// A persistent, session-id-keyed processing record.
pub struct ProcessingLedger {
    path: PathBuf,
    entries: HashMap<String, LedgerEntry>,
}

impl ProcessingLedger {
    /// Load the ledger at `path`, or start empty if it doesn't exist yet.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            return Ok(Self {
                path,
                entries: HashMap::new(),
            });
        }
        let content = std::fs::read_to_string(&path)
            .map_err(|e| Error::RegistryIo(format!("reading ledger {}: {e}", path.display())))?;
        let entries = serde_json::from_str(&content)
            .map_err(|e| Error::RegistryIo(format!("parsing ledger {}: {e}", path.display())))?;
        Ok(Self { path, entries })
    }

    /// Whether `session_id` has already been considered.
    #[must_use]
    pub fn is_processed(&self, session_id: &str) -> bool {
        self.entries.contains_key(session_id)
    }

    /// Record that `session_id` has been considered, then persist
    /// immediately (atomic write-to-temp-then-rename, matching the rule
    /// registry).
    pub fn mark(&mut self, session_id: &str, produced: bool) -> Result<()> {
        self.entries.insert(
            session_id.to_string(),
            LedgerEntry {
                processed_at: Utc::now(),
                produced,
            },
        );
        self.persist()
    }

    fn persist(&self) -> Result<()> {
        let serialized = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| Error::RegistryIo(format!("serializing ledger: {e}")))?;
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, serialized)
            .map_err(|e| Error::RegistryIo(format!("writing {}: {e}", tmp_path.display())))?;
        std::fs::rename(&tmp_path, &self.path)
            .map_err(|e| Error::RegistryIo(format!("renaming into {}: {e}", self.path.display())))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}
