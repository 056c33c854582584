//! # LLM Client
//!
//! Request/response adapter to an external LLM process: one-shot text
//! completion with a system/user prompt pair and a bounded deadline. The
//! LLM process itself lives outside this crate; this module models the
//! interface every stage calls through, plus the lenient response parsers
//! every stage needs to turn free-text LLM output back into structured
//! data.

pub mod parsing;

use crate::constants::defaults::LLM_TIMEOUT_SECS;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// A single completion request.
#[derive(Debug, Clone)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    #[must_use]
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }
}

/// One-shot text completion with a bounded deadline.
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Send `prompt` and return the raw completion text. Implementations
    /// apply their own deadline internally; [`LLMClient::complete_with_timeout`]
    /// wraps any implementation with the default 120s deadline from the
    /// concurrency model.
    async fn complete(&self, prompt: Prompt) -> Result<String>;
}

/// Wrap any [`LLMClient`] call with the default per-invocation deadline.
/// A timeout is surfaced as [`Error::Llm`], which callers treat exactly
/// like any other LLM failure (fallback score, skip candidate).
pub async fn complete_with_timeout(client: &dyn LLMClient, prompt: Prompt) -> Result<String> {
    tokio::time::timeout(Duration::from_secs(LLM_TIMEOUT_SECS), client.complete(prompt))
        .await
        .map_err(|_| Error::Llm("request timed out".into()))?
}

/// Shared, cloneable handle to an [`LLMClient`] implementation.
pub type SharedLLMClient = Arc<dyn LLMClient>;

/// A canned-response client for tests: returns a fixed string (or cycles
/// through a list) regardless of the prompt, with no network or process
/// boundary crossed.
pub struct StubLLMClient {
    responses: parking_lot::Mutex<Vec<String>>,
    default: String,
}

impl StubLLMClient {
    #[must_use]
    pub fn new(default: impl Into<String>) -> Self {
        Self {
            responses: parking_lot::Mutex::new(Vec::new()),
            default: default.into(),
        }
    }

    #[must_use]
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses: parking_lot::Mutex::new(responses),
            default: String::new(),
        }
    }
}

#[async_trait]
impl LLMClient for StubLLMClient {
    async fn complete(&self, _prompt: Prompt) -> Result<String> {
        let mut queue = self.responses.lock();
        if queue.is_empty() {
            Ok(self.default.clone())
        } else {
            Ok(queue.remove(0))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stub_cycles_through_responses_then_falls_back() {
        let client = StubLLMClient::with_responses(vec!["[1,2,3]".into()]);
        let first = client.complete(Prompt::new("s", "u")).await.unwrap();
        assert_eq!(first, "[1,2,3]");
        let second = client.complete(Prompt::new("s", "u")).await.unwrap();
        assert_eq!(second, "");
    }

    #[tokio::test]
    async fn timeout_wrapper_surfaces_llm_error_on_slow_client() {
        struct Slow;
        #[async_trait]
        impl LLMClient for Slow {
            async fn complete(&self, _prompt: Prompt) -> Result<String> {
                tokio::time::sleep(Duration::from_secs(9999)).await;
                Ok(String::new())
            }
        }
        tokio::time::pause();
        let slow = Slow;
        let fut = complete_with_timeout(&slow, Prompt::new("s", "u"));
        tokio::time::advance(Duration::from_secs(LLM_TIMEOUT_SECS + 1)).await;
        let result = fut.await;
        assert!(matches!(result, Err(Error::Llm(_))));
    }
}
