//! Session file parsing.
//!
//! A session file is a JSON document with a `messages` array. Each entry
//! is either `{message: {role, content}, isMeta?}` or the flattened
//! `{role, content}` shape. Content is a string, or any JSON value to be
//! stringified. Meta-tagged messages and messages shorter than 10
//! characters are dropped.

pub mod ingestor;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};

const MIN_MESSAGE_CHARS: usize = 10;

#[derive(Debug, Deserialize)]
struct SessionFile {
    #[serde(default)]
    messages: Vec<RawMessageEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawMessageEntry {
    Wrapped {
        message: RawMessage,
        #[serde(default, rename = "isMeta")]
        is_meta: bool,
    },
    Flat(RawMessage),
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    role: String,
    content: Value,
}

/// A single non-meta, non-trivial message extracted from a session file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionMessage {
    pub role: String,
    pub content: String,
}

/// Parse `raw` (the contents of a session file) into its kept messages, in
/// order. Absence of `messages` yields an empty list; malformed JSON is a
/// [`Error::Parse`].
pub fn parse_session_file(raw: &str) -> Result<Vec<SessionMessage>> {
    let file: SessionFile =
        serde_json::from_str(raw).map_err(|e| Error::Parse(format!("session file: {e}")))?;

    Ok(file
        .messages
        .into_iter()
        .filter_map(|entry| {
            let (message, is_meta) = match entry {
                RawMessageEntry::Wrapped { message, is_meta } => (message, is_meta),
                RawMessageEntry::Flat(message) => (message, false),
            };
            if is_meta {
                return None;
            }
            let content = stringify_content(&message.content);
            if content.chars().count() < MIN_MESSAGE_CHARS {
                return None;
            }
            Some(SessionMessage {
                role: message.role,
                content,
            })
        })
        .collect())
}

fn stringify_content(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Concatenate kept messages into the `[role]: content` transcript the
/// chunker consumes, one message per paragraph.
#[must_use]
pub fn concatenate_messages(messages: &[SessionMessage]) -> String {
    messages
        .iter()
        .map(|m| format!("[{}]: {}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}
