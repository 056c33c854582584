//! # Chunker
//!
//! Splits a cleaned session transcript into bounded, overlapping text
//! chunks with stable, contiguous indices.

use regex::Regex;
use std::sync::LazyLock;

use crate::constants::defaults::{CHUNK_OVERLAP, CHUNK_SIZE, MIN_CHUNK_CHARS};

/// One chunk of a session transcript, before embedding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawChunk {
    pub index: u32,
    pub text: String,
}

/// Chunker configuration.
#[derive(Debug, Clone, Copy)]
pub struct ChunkerConfig {
    pub chunk_size: usize,
    pub overlap: usize,
    pub min_chunk_chars: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: CHUNK_SIZE,
            overlap: CHUNK_OVERLAP,
            min_chunk_chars: MIN_CHUNK_CHARS,
        }
    }
}

static BLANK_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*\n(?:[ \t]*\n)+").unwrap());
static TIMESTAMP_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\[?\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}(?:\.\d+)?Z?\]?\s*").unwrap());

/// Splits transcripts into bounded, overlapping chunks.
#[derive(Debug, Clone, Copy, Default)]
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    #[must_use]
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    /// Clean a raw transcript: collapse blank-line runs, strip timestamp
    /// prefixes, trim trailing whitespace per line.
    #[must_use]
    pub fn clean(&self, text: &str) -> String {
        let stripped = TIMESTAMP_PREFIX.replace_all(text, "");
        let collapsed = BLANK_RUNS.replace_all(&stripped, "\n\n");
        collapsed
            .lines()
            .map(str::trim_end)
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string()
    }

    /// Split cleaned text into an ordered, contiguous sequence of chunks.
    /// Chunks shorter than `min_chunk_chars` are dropped; indices stay
    /// contiguous from 0 over the *kept* chunks. Every slice point is moved
    /// onto a UTF-8 char boundary before slicing, so non-ASCII transcripts
    /// without a nearby paragraph/sentence break never panic.
    #[must_use]
    pub fn chunk(&self, text: &str) -> Vec<RawChunk> {
        let cleaned = self.clean(text);
        if cleaned.is_empty() {
            return Vec::new();
        }

        let boundaries = self.split_boundaries(&cleaned);
        let mut raw_pieces = Vec::new();
        let mut start = 0usize;
        while start < cleaned.len() {
            let target_end = (start + self.config.chunk_size).min(cleaned.len());
            let end = if target_end == cleaned.len() {
                target_end
            } else {
                boundaries
                    .iter()
                    .filter(|&&b| b > start && b <= target_end)
                    .next_back()
                    .copied()
                    .unwrap_or_else(|| {
                        let floored = floor_char_boundary(&cleaned, target_end);
                        if floored > start {
                            floored
                        } else {
                            ceil_char_boundary(&cleaned, start + 1)
                        }
                    })
            };
            raw_pieces.push(cleaned[start..end].to_string());

            if end >= cleaned.len() {
                break;
            }
            let candidate = floor_char_boundary(&cleaned, end.saturating_sub(self.config.overlap));
            start = if candidate > start {
                candidate
            } else {
                ceil_char_boundary(&cleaned, start + 1)
            };
        }

        raw_pieces
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| s.chars().count() >= self.config.min_chunk_chars)
            .enumerate()
            .map(|(i, text)| RawChunk {
                index: i as u32,
                text,
            })
            .collect()
    }

    /// Candidate split points: paragraph breaks first, then sentence ends.
    /// Falls back to a hard split at the char boundary when neither is
    /// available near the target length (handled by the caller defaulting
    /// to `target_end`).
    fn split_boundaries(&self, text: &str) -> Vec<usize> {
        let mut boundaries: Vec<usize> = Vec::new();
        for (idx, _) in text.match_indices("\n\n") {
            boundaries.push(idx + 2);
        }
        for (idx, m) in text.match_indices(". ") {
            boundaries.push(idx + m.len());
        }
        boundaries.sort_unstable();
        boundaries.dedup();
        boundaries
    }
}

/// Nearest byte offset `<= idx` that falls on a UTF-8 char boundary.
fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// Nearest byte offset `>= idx` that falls on a UTF-8 char boundary.
fn ceil_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx < s.len() && !s.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}
