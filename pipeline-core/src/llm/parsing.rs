//! Lenient parsers for LLM completion text.
//!
//! The envelope around a model's JSON output varies by provider and by
//! prompt phrasing, so every parser here is forgiving by construction: a
//! parse failure returns a documented default rather than propagating an
//! error.

use serde_json::Value;

/// Parse a batch of integer scores out of `raw`. Tolerates a bare array,
/// `{"result": [...]}`/`{"content": [...]}` envelopes, and a content-block
/// array with a `text` field holding the actual JSON. Falls back to
/// `default` repeated `expected_len` times if nothing parseable is found.
#[must_use]
pub fn parse_score_array(raw: &str, expected_len: usize, default: u8) -> Vec<u8> {
    extract_json_array(raw)
        .map(|values| {
            values
                .into_iter()
                .filter_map(|v| v.as_u64())
                .map(|n| n.min(10) as u8)
                .collect::<Vec<_>>()
        })
        .filter(|scores| scores.len() == expected_len)
        .unwrap_or_else(|| vec![default; expected_len])
}

/// Find the first JSON array of values in `raw`, looking through the
/// known envelope shapes before falling back to a raw `[...]` scan.
fn extract_json_array(raw: &str) -> Option<Vec<Value>> {
    if let Ok(Value::Array(values)) = serde_json::from_str::<Value>(raw.trim()) {
        return Some(values);
    }

    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(raw.trim()) {
        for key in ["result", "content"] {
            match map.get(key) {
                Some(Value::Array(values)) => return Some(values.clone()),
                Some(Value::String(s)) => {
                    if let Some(values) = extract_json_array(s) {
                        return Some(values);
                    }
                }
                Some(Value::Array(blocks)) if blocks.iter().any(Value::is_object) => {}
                _ => {}
            }
        }
        if let Some(Value::Array(blocks)) = map.get("content") {
            for block in blocks {
                if let Some(text) = block.get("text").and_then(Value::as_str) {
                    if let Some(values) = extract_json_array(text) {
                        return Some(values);
                    }
                }
            }
        }
    }

    let start = raw.find('[')?;
    let end = raw.rfind(']')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<Value>(&raw[start..=end])
        .ok()
        .and_then(|v| match v {
            Value::Array(values) => Some(values),
            _ => None,
        })
}

/// One candidate rule parsed from an insight-extraction response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleLine {
    pub text: String,
}

/// Parse bullet/numbered rule lines out of an LLM response. Lines that are
/// blank after stripping common bullet markers are dropped.
#[must_use]
pub fn parse_rule_lines(raw: &str) -> Vec<RuleLine> {
    raw.lines()
        .filter_map(|line| {
            let trimmed = line.trim();
            let stripped = trimmed
                .trim_start_matches(['-', '*', '•'])
                .trim_start()
                .trim_start_matches(|c: char| c.is_ascii_digit())
                .trim_start_matches('.')
                .trim_start_matches(')')
                .trim();
            if stripped.is_empty() {
                None
            } else {
                Some(RuleLine {
                    text: stripped.to_string(),
                })
            }
        })
        .collect()
}

/// The three fields a `ReflectionGenerator` prompt expects back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflectionTriple {
    pub root_cause: String,
    pub reflection: String,
    pub prevention_rule: String,
}

/// Parse a `ROOT_CAUSE: ... / REFLECTION: ... / PREVENTION_RULE: ...`
/// response. Returns `None` if any of the three fields is missing or empty;
/// malformed responses are discarded rather than surfaced as partial data.
#[must_use]
pub fn parse_reflection_triple(raw: &str) -> Option<ReflectionTriple> {
    let mut root_cause = None;
    let mut reflection = None;
    let mut prevention_rule = None;

    for line in raw.lines() {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("ROOT_CAUSE:") {
            root_cause = Some(rest.trim().to_string());
        } else if let Some(rest) = trimmed.strip_prefix("REFLECTION:") {
            reflection = Some(rest.trim().to_string());
        } else if let Some(rest) = trimmed.strip_prefix("PREVENTION_RULE:") {
            prevention_rule = Some(rest.trim().to_string());
        }
    }

    let root_cause = root_cause.filter(|s| !s.is_empty())?;
    let reflection = reflection.filter(|s| !s.is_empty())?;
    let prevention_rule = prevention_rule.filter(|s| !s.is_empty())?;
    Some(ReflectionTriple {
        root_cause,
        reflection,
        prevention_rule,
    })
}

/// A SKILL document parsed from a frontmatter-prefixed response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillDocument {
    pub name: String,
    pub description: String,
    pub auto_activation: String,
    pub body: String,
}

/// Parse a `name: ... / description: ... / auto_activation: ...` header
/// followed by a free-text body. Returns `None` if the header is missing
/// any of the three required fields.
#[must_use]
pub fn parse_skill_document(raw: &str) -> Option<SkillDocument> {
    let mut name = None;
    let mut description = None;
    let mut auto_activation = None;
    let mut body_start = 0;

    for (idx, line) in raw.lines().enumerate() {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("name:") {
            name = Some(rest.trim().to_string());
        } else if let Some(rest) = trimmed.strip_prefix("description:") {
            description = Some(rest.trim().to_string());
        } else if let Some(rest) = trimmed.strip_prefix("auto_activation:") {
            auto_activation = Some(rest.trim().to_string());
            body_start = idx + 1;
        }
    }

    let name = name.filter(|s| !s.is_empty())?;
    let description = description.filter(|s| !s.is_empty())?;
    let auto_activation = auto_activation.filter(|s| !s.is_empty())?;
    let body = raw
        .lines()
        .skip(body_start)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string();

    Some(SkillDocument {
        name,
        description,
        auto_activation,
        body,
    })
}
