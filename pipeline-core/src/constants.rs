//! Global constants for the pipeline.
//!
//! Centralizes magic numbers that aren't operator-facing tuning knobs (those
//! live in [`crate::config::Config`]) but are architectural: batch sizes,
//! windows, and the embedding dimension the whole system is built around.

/// Default configuration values.
pub mod defaults {
    /// Embedding vector dimension. Some legacy documentation mentions 768;
    /// this implementation uses 384 consistently everywhere.
    pub const EMBEDDING_DIM: usize = 384;

    /// Target chunk length in characters.
    pub const CHUNK_SIZE: usize = 1500;
    /// Overlap between adjacent chunks, in characters.
    pub const CHUNK_OVERLAP: usize = 200;
    /// Chunks shorter than this (after trimming) are dropped.
    pub const MIN_CHUNK_CHARS: usize = 100;

    /// Chunks per LLM scoring batch.
    pub const SCORE_BATCH_SIZE: usize = 25;
    /// Bounded concurrency for scoring LLM calls.
    pub const SCORE_CONCURRENCY: usize = 3;
    /// Fallback score applied when an LLM batch can't be parsed or times out.
    pub const SCORE_FALLBACK: u8 = 5;

    /// Insight pairs per LLM request.
    pub const INSIGHT_BATCH_SIZE: usize = 3;
    /// Maximum high/low quality pairs considered per run.
    pub const INSIGHT_MAX_PAIRS: usize = 10;

    /// Deadline for a single LLM invocation, in seconds.
    pub const LLM_TIMEOUT_SECS: u64 = 120;

    /// Length of a generated rule id.
    pub const RULE_ID_LEN: usize = 8;

    /// Number of leading session messages fed to the session summarizer.
    pub const SUMMARY_MESSAGE_WINDOW: usize = 40;
    /// Top-k prior sessions consulted for novelty scoring.
    pub const NOVELTY_TOP_K: usize = 3;

    /// Sliding window (in edit/write ops) used by the backtracking detector.
    pub const BACKTRACK_WINDOW: usize = 6;
    /// Same-path occurrences within the window that count as backtracking.
    pub const BACKTRACK_THRESHOLD: usize = 3;
    /// Consecutive error-flavored assistant messages that count as a retry loop.
    pub const RETRY_LOOP_LENGTH: usize = 3;
}

/// File and directory names under the workspace root (see [`crate::workspace`]).
pub mod paths {
    pub const SESSIONS_DIR: &str = "logs/sessions";
    pub const RULES_FILE: &str = "rules.json";
    pub const REFLECTION_LEDGER_FILE: &str = "reflection-state.json";
    pub const SKILL_LEDGER_FILE: &str = "skill-state.json";
    pub const CONFIG_FILE: &str = "config.json";
    pub const SKILL_CANDIDATES_DIR: &str = "skill-candidates";
    pub const SKILLS_DIR: &str = "skills";
    pub const DASHBOARD_FILE: &str = "visualizations/dashboard-data.json";
}

/// Named vector-store collections.
pub mod collections {
    pub const SESSIONS: &str = "sessions";
    pub const REFLECTIONS: &str = "reflections";
    pub const RULES: &str = "rules";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_dim_is_384() {
        assert_eq!(defaults::EMBEDDING_DIM, 384);
    }

    #[test]
    fn chunk_overlap_smaller_than_chunk_size() {
        assert!(defaults::CHUNK_OVERLAP < defaults::CHUNK_SIZE);
    }
}
