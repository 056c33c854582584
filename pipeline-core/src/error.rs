//! Error taxonomy for the self-improvement pipeline.
//!
//! Every stage body is wrapped in an isolation boundary (see
//! [`crate::orchestrator`]) that catches all of these and continues to the
//! next stage. Only [`Error::Config`] and a registry write failure that
//! leaves no last-good copy escalate to a fatal, non-zero exit.

use crate::retry::Retryable;

/// Result type alias used throughout the pipeline.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the self-improvement pipeline.
///
/// Kinds are kept distinct and never conflated, per the error taxonomy in
/// the system design: configuration errors are fatal, everything else is
/// stage-scoped and recoverable by skipping the offending unit.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Config load/parse failure. Fatal; the orchestrator exits nonzero.
    #[error("configuration error: {0}")]
    Config(String),

    /// Any vector-store operation failure (network, collection, payload).
    #[error("vector store error: {0}")]
    VectorStore(String),

    /// Embedder failed to load or produced a vector of unexpected shape.
    #[error("embedding error: {0}")]
    Embedding(String),

    /// The LLM client timed out, refused, or returned a transport error.
    #[error("llm error: {0}")]
    Llm(String),

    /// A session file or an LLM response could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// Rule registry read/write failure. The last-good registry is kept.
    #[error("registry io error: {0}")]
    RegistryIo(String),

    /// Input validation failure not covered by a more specific kind.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether the error represents a transient condition worth retrying.
    ///
    /// Used by [`crate::retry::RetryPolicy`] to decide whether to back off
    /// and try again or surface the failure immediately. Parse and config
    /// errors are never recoverable: retrying a malformed document or a
    /// bad config file produces the same malformed result.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::VectorStore(_) | Error::Llm(_) | Error::Io(_)
        )
    }
}

impl Retryable for Error {
    fn is_recoverable(&self) -> bool {
        Error::is_recoverable(self)
    }
}
