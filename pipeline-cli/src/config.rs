//! Wires together the store, LLM client, embedder, and `pipeline_core::Config`
//! for one CLI invocation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use pipeline_core::config::Config;
use pipeline_core::embeddings::{Embedder, HashingEmbedder};
use pipeline_core::llm::{SharedLLMClient, StubLLMClient};
use pipeline_core::vector_store::memory::InMemoryStore;
use pipeline_core::vector_store::VectorStore;
use pipeline_core::workspace;

/// Everything a command needs to run a stage: the resolved config, the
/// workspace root, and the constructed store/embedder/LLM handles.
pub struct Runtime {
    pub workspace_root: PathBuf,
    pub config: Config,
    pub store: Box<dyn VectorStore>,
    pub embedder: Arc<dyn Embedder>,
    pub llm: SharedLLMClient,
}

/// Build a [`Runtime`] from an optional explicit config path. Falls back to
/// workspace discovery (`WORKSPACE_ROOT` env var, or walking up from `cwd`
/// for a `config.json` marker) when `config_path` is `None`.
///
/// The vector store backend is chosen by environment: `QDRAN_URL` (read via
/// `QDRANT_URL`) selects the real Qdrant-backed store when the `qdrant`
/// feature is enabled; otherwise an in-process store is used, which is
/// sufficient for a single CLI invocation operating on its own workspace.
pub fn load_runtime(config_path: Option<&Path>) -> anyhow::Result<Runtime> {
    let workspace_root = match config_path {
        Some(p) => p
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
        None => workspace::resolve().to_path_buf(),
    };

    let config_file = config_path.map(Path::to_path_buf).unwrap_or_else(|| {
        pipeline_core::workspace::Layout::new(&workspace_root).config_file()
    });
    let config = if config_file.is_file() {
        Config::load(Some(&config_file))?.validate()?
    } else {
        Config::default().validate()?
    };

    let store = build_store()?;
    let embedder: Arc<dyn Embedder> = Arc::new(HashingEmbedder::new());
    let llm = build_llm_client();

    Ok(Runtime {
        workspace_root,
        config,
        store,
        embedder,
        llm,
    })
}

#[cfg(feature = "qdrant")]
fn build_store() -> anyhow::Result<Box<dyn VectorStore>> {
    use pipeline_core::vector_store::qdrant::QdrantStore;
    if let Ok(url) = std::env::var("QDRANT_URL") {
        return Ok(Box::new(QdrantStore::connect(&url)?));
    }
    Ok(Box::new(InMemoryStore::new()))
}

#[cfg(not(feature = "qdrant"))]
fn build_store() -> anyhow::Result<Box<dyn VectorStore>> {
    Ok(Box::new(InMemoryStore::new()))
}

/// No production LLM provider is wired in yet; a stub that always falls
/// back to defaults keeps every stage runnable without network access.
/// Swap this for a real client once one is configured via environment.
fn build_llm_client() -> SharedLLMClient {
    Arc::new(StubLLMClient::new("[]"))
}
