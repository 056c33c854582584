//! Pure heuristic pre-filter for chunk quality scoring.
//!
//! `pre_filter` never touches the network or the vector store: it is
//! total, deterministic, and returns `None` exactly for the chunks that
//! need an LLM opinion.

use std::sync::LazyLock;

use regex::Regex;

const SHORT_TEXT_CHARS: usize = 20;
const ROUTINE_SHELL_CHARS: usize = 80;

static HEX_OR_BASE64: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9+/=]{40,}$|^[0-9a-fA-F]{32,}$").unwrap());
static ROUTINE_SHELL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(git status|git diff|ls( -\w+)?|pwd|cd \S+|cat \S+)\b").unwrap()
});
static STRONG_SIGNAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)root cause|decided to|lesson learned|here's why|here is why").unwrap()
});

const WEAK_SIGNAL_KEYWORDS: &[&str] = &[
    "refactor",
    "migration",
    "performance",
    "security",
    "algorithm",
    "architecture",
];

/// Classify `text` without calling the LLM. Returns `Some(score)` when the
/// heuristic is confident, `None` when the text should be sent to the LLM
/// pass.
#[must_use]
pub fn pre_filter(text: &str) -> Option<u8> {
    let trimmed = text.trim();

    if trimmed.chars().count() < SHORT_TEXT_CHARS || HEX_OR_BASE64.is_match(trimmed) {
        return Some(1);
    }

    if is_stacktrace_heavy(trimmed) {
        return Some(2);
    }

    if trimmed.chars().count() < ROUTINE_SHELL_CHARS && ROUTINE_SHELL.is_match(trimmed) {
        return Some(3);
    }

    if STRONG_SIGNAL.is_match(trimmed) {
        return None;
    }

    let weak_signal_count = WEAK_SIGNAL_KEYWORDS
        .iter()
        .filter(|kw| trimmed.to_lowercase().contains(*kw))
        .count();
    if weak_signal_count >= 2 {
        return None;
    }

    Some(4)
}

fn is_stacktrace_heavy(text: &str) -> bool {
    let lines: Vec<&str> = text.lines().collect();
    if lines.is_empty() {
        return false;
    }
    let frame_lines = lines
        .iter()
        .filter(|l| {
            let t = l.trim_start();
            t.starts_with("at ") || t.starts_with("File \"") || t.contains(".rs:")
        })
        .count();
    let dense_error_json = text.trim_start().starts_with('{')
        && (text.contains("\"stack\"") || text.contains("\"stacktrace\""));
    frame_lines * 2 >= lines.len() && frame_lines >= 2 || dense_error_json
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pre_filter_is_pure() {
        let text = "decided to rewrite the scheduler after the outage last week";
        assert_eq!(pre_filter(text), pre_filter(text));
    }

    #[test]
    fn very_short_text_scores_one() {
        assert_eq!(pre_filter("ok"), Some(1));
    }

    #[test]
    fn long_hex_payload_scores_one() {
        let hex = "a".repeat(40);
        assert_eq!(pre_filter(&hex), Some(1));
    }

    #[test]
    fn stacktrace_heavy_text_scores_two() {
        let text = "thread panicked\n  at src/main.rs:42\n  at src/lib.rs:10\n  at src/run.rs:5";
        assert_eq!(pre_filter(text), Some(2));
    }

    #[test]
    fn routine_shell_output_scores_three() {
        assert_eq!(pre_filter("git status\nnothing to commit, working tree clean"), Some(3));
    }

    #[test]
    fn strong_signal_phrase_defers_to_llm() {
        let text = "here's why the retry loop kept failing: the root cause was a stale token";
        assert_eq!(pre_filter(text), None);
    }

    #[test]
    fn two_weak_signals_defer_to_llm() {
        let text = "this refactor touches the core algorithm and changes the architecture substantially across several files";
        assert_eq!(pre_filter(text), None);
    }

    #[test]
    fn one_weak_signal_falls_through_to_default() {
        let text = "small refactor of the helper function, nothing else changed here today";
        assert_eq!(pre_filter(text), Some(4));
    }

    #[test]
    fn ordinary_content_defaults_to_four() {
        let text = "walked through the onboarding flow with the new teammate this afternoon";
        assert_eq!(pre_filter(text), Some(4));
    }
}
