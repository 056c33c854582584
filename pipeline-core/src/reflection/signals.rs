//! Failure-signal detection over a session's raw messages.

use crate::constants::defaults::{BACKTRACK_THRESHOLD, BACKTRACK_WINDOW, RETRY_LOOP_LENGTH};
use crate::session::SessionMessage;

const ERROR_VOCABULARY: &[&str] = &["error", "failed", "exception"];
const REVERT_MARKERS: &[&str] = &["git reset", "git revert", "git checkout --"];

/// A detected failure signal, with enough context to prompt the LLM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureSignal {
    RetryLoop { excerpt: String },
    Backtracking { path: String, excerpt: String },
    GitRevert { excerpt: String },
}

/// Scan a session's messages for every documented failure signal.
#[must_use]
pub fn detect_signals(messages: &[SessionMessage]) -> Vec<FailureSignal> {
    let mut signals = Vec::new();
    signals.extend(detect_retry_loop(messages));
    signals.extend(detect_backtracking(messages));
    signals.extend(detect_git_revert(messages));
    signals
}

fn is_error_flavored(text: &str) -> bool {
    let lower = text.to_lowercase();
    ERROR_VOCABULARY.iter().any(|kw| lower.contains(kw))
}

fn detect_retry_loop(messages: &[SessionMessage]) -> Option<FailureSignal> {
    let assistant_messages: Vec<&SessionMessage> = messages
        .iter()
        .filter(|m| m.role == "assistant")
        .collect();
    assistant_messages
        .windows(RETRY_LOOP_LENGTH)
        .find(|window| window.iter().all(|m| is_error_flavored(&m.content)))
        .map(|window| FailureSignal::RetryLoop {
            excerpt: window
                .iter()
                .map(|m| m.content.as_str())
                .collect::<Vec<_>>()
                .join("\n---\n"),
        })
}

fn extract_edit_path(content: &str) -> Option<String> {
    content
        .split_whitespace()
        .find(|token| token.contains('.') && token.contains('/'))
        .map(str::to_string)
}

fn detect_backtracking(messages: &[SessionMessage]) -> Option<FailureSignal> {
    let edit_paths: Vec<(usize, String)> = messages
        .iter()
        .enumerate()
        .filter(|(_, m)| m.role == "assistant")
        .filter_map(|(i, m)| extract_edit_path(&m.content).map(|p| (i, p)))
        .collect();

    for window in edit_paths.windows(BACKTRACK_WINDOW.min(edit_paths.len().max(1))) {
        let mut counts: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();
        for (_, path) in window {
            *counts.entry(path.as_str()).or_default() += 1;
        }
        if let Some((path, _)) = counts.iter().find(|(_, &count)| count >= BACKTRACK_THRESHOLD) {
            return Some(FailureSignal::Backtracking {
                path: (*path).to_string(),
                excerpt: window
                    .iter()
                    .map(|(_, p)| p.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            });
        }
    }
    None
}

fn detect_git_revert(messages: &[SessionMessage]) -> Option<FailureSignal> {
    messages.iter().find_map(|m| {
        let lower = m.content.to_lowercase();
        REVERT_MARKERS
            .iter()
            .find(|marker| lower.contains(*marker))
            .map(|_| FailureSignal::GitRevert {
                excerpt: m.content.clone(),
            })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(role: &str, content: &str) -> SessionMessage {
        SessionMessage {
            role: role.to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn three_consecutive_error_messages_trigger_retry_loop() {
        let messages = vec![
            msg("assistant", "error: the build failed again"),
            msg("assistant", "still failed, exception raised"),
            msg("assistant", "error: another failed attempt"),
        ];
        let signals = detect_signals(&messages);
        assert!(signals.iter().any(|s| matches!(s, FailureSignal::RetryLoop { .. })));
    }

    #[test]
    fn two_error_messages_do_not_trigger_retry_loop() {
        let messages = vec![
            msg("assistant", "error: the build failed"),
            msg("assistant", "fixed it, tests pass now"),
        ];
        assert!(detect_signals(&messages).is_empty());
    }

    #[test]
    fn repeated_edits_to_same_path_trigger_backtracking() {
        let messages = vec![
            msg("assistant", "editing src/lib.rs for the first pass"),
            msg("assistant", "editing src/main.rs unrelated change"),
            msg("assistant", "editing src/lib.rs again to fix the bug"),
            msg("assistant", "editing src/lib.rs a third time, still broken"),
        ];
        let signals = detect_signals(&messages);
        assert!(signals.iter().any(|s| matches!(s, FailureSignal::Backtracking { .. })));
    }

    #[test]
    fn git_revert_mention_is_detected() {
        let messages = vec![msg("assistant", "ran `git revert HEAD` to undo the bad commit")];
        let signals = detect_signals(&messages);
        assert!(signals.iter().any(|s| matches!(s, FailureSignal::GitRevert { .. })));
    }

    #[test]
    fn clean_session_has_no_signals() {
        let messages = vec![
            msg("user", "please add a health check endpoint"),
            msg("assistant", "added the endpoint and a test for it"),
        ];
        assert!(detect_signals(&messages).is_empty());
    }
}
