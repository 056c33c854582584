//! Bulk session ingestion into the `sessions` collection.

use std::path::Path;

use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};

use super::{concatenate_messages, parse_session_file};
use crate::chunk::Chunker;
use crate::constants::collections::SESSIONS;
use crate::embeddings::SharedEmbedder;
use crate::error::Result;
use crate::vector_store::{Point, VectorStore};

/// Processed/skipped/errored counters for one ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub processed: usize,
    pub skipped: usize,
    pub errors: usize,
    pub chunks_upserted: usize,
}

/// Parses session files under a directory and upserts their chunks.
pub struct SessionIngestor<'a> {
    store: &'a dyn VectorStore,
    embedder: &'a SharedEmbedder,
    chunker: Chunker,
}

impl<'a> SessionIngestor<'a> {
    #[must_use]
    pub fn new(store: &'a dyn VectorStore, embedder: &'a SharedEmbedder, chunker: Chunker) -> Self {
        Self {
            store,
            embedder,
            chunker,
        }
    }

    /// Ingest every session file under `dir` not already present in
    /// `sessions`. Idempotent at session granularity: re-running is a
    /// no-op for files whose session id was already ingested.
    pub async fn ingest_dir(&self, dir: &Path) -> Result<IngestSummary> {
        self.store
            .ensure_collection(SESSIONS, self.embedder.dimension())
            .await?;
        let already_ingested = self.store.list_session_ids().await?;

        let mut summary = IngestSummary::default();
        let Ok(entries) = std::fs::read_dir(dir) else {
            warn!(dir = %dir.display(), "session directory not readable");
            return Ok(summary);
        };

        for entry in entries.filter_map(std::result::Result::ok) {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(session_id) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string)
            else {
                continue;
            };
            if already_ingested.contains(&session_id) {
                summary.skipped += 1;
                continue;
            }

            match self.ingest_file(&session_id, &path).await {
                Ok(chunks) => {
                    summary.processed += 1;
                    summary.chunks_upserted += chunks;
                }
                Err(e) => {
                    warn!(session_id = %session_id, error = %e, "skipping session file");
                    summary.errors += 1;
                }
            }
        }

        info!(
            processed = summary.processed,
            skipped = summary.skipped,
            errors = summary.errors,
            chunks = summary.chunks_upserted,
            "ingestion complete"
        );
        Ok(summary)
    }

    async fn ingest_file(&self, session_id: &str, path: &Path) -> Result<usize> {
        let raw = std::fs::read(path)?;
        let text = crate::vector_store::sanitize_text(&raw);
        let messages = parse_session_file(&text)?;
        if messages.is_empty() {
            return Ok(0);
        }

        let transcript = concatenate_messages(&messages);
        let chunks = self.chunker.chunk(&transcript);
        if chunks.is_empty() {
            return Ok(0);
        }

        let date = Utc::now().format("%Y-%m-%d").to_string();
        let mut points = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            let vector = self.embedder.embed(&chunk.text).await?;
            let mut payload = std::collections::HashMap::new();
            payload.insert("session_id".to_string(), json!(session_id));
            payload.insert("chunk_text".to_string(), json!(chunk.text));
            payload.insert("date".to_string(), json!(date));
            payload.insert("chunk_index".to_string(), json!(chunk.index));
            payload.insert("pending_score".to_string(), json!(false));
            points.push(Point::new(
                format!("{session_id}:{}", chunk.index),
                vector,
                payload,
            ));
        }

        let count = points.len();
        self.store.upsert_batch(SESSIONS, points).await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashingEmbedder;
    use crate::vector_store::memory::InMemoryStore;
    use std::sync::Arc;

    fn write_session(dir: &Path, id: &str, messages_json: &str) {
        std::fs::write(dir.join(format!("{id}.json")), messages_json).unwrap();
    }

    #[tokio::test]
    async fn ingests_new_session_and_skips_already_ingested() {
        let dir = tempfile::tempdir().unwrap();
        write_session(
            dir.path(),
            "s1",
            r#"{"messages": [
                {"role": "user", "content": "please look into this failing test for me"},
                {"role": "assistant", "content": "found the bug, it was a missing null check in the parser"}
            ]}"#,
        );

        let store = InMemoryStore::new();
        let embedder: SharedEmbedder = Arc::new(HashingEmbedder::new());
        let ingestor = SessionIngestor::new(&store, &embedder, Chunker::default());

        let summary = ingestor.ingest_dir(dir.path()).await.unwrap();
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.errors, 0);
        assert!(summary.chunks_upserted >= 1);

        let summary_again = ingestor.ingest_dir(dir.path()).await.unwrap();
        assert_eq!(summary_again.processed, 0);
        assert_eq!(summary_again.skipped, 1);
    }

    #[tokio::test]
    async fn malformed_file_is_skipped_with_error_count() {
        let dir = tempfile::tempdir().unwrap();
        write_session(dir.path(), "bad", "not valid json");

        let store = InMemoryStore::new();
        let embedder: SharedEmbedder = Arc::new(HashingEmbedder::new());
        let ingestor = SessionIngestor::new(&store, &embedder, Chunker::default());

        let summary = ingestor.ingest_dir(dir.path()).await.unwrap();
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.processed, 0);
    }

    #[tokio::test]
    async fn empty_messages_produce_no_chunks() {
        let dir = tempfile::tempdir().unwrap();
        write_session(dir.path(), "empty", r#"{"messages": []}"#);

        let store = InMemoryStore::new();
        let embedder: SharedEmbedder = Arc::new(HashingEmbedder::new());
        let ingestor = SessionIngestor::new(&store, &embedder, Chunker::default());

        let summary = ingestor.ingest_dir(dir.path()).await.unwrap();
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.chunks_upserted, 0);
    }
}
