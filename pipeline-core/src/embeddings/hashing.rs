//! Feature-hashing bag-of-words embedding.
//!
//! Each whitespace token is hashed into one of `dim` buckets (with a second,
//! differently-seeded hash deciding the sign, the standard "hashing trick"),
//! bucket contributions are mean-pooled over the token count, and the
//! resulting vector is L2-normalized. Deterministic and collision-tolerant:
//! semantically unrelated text rarely shares enough tokens to produce a
//! spuriously high cosine similarity, while paraphrases of the same
//! sentence reliably do.

use super::similarity::l2_normalize;

fn fnv1a(bytes: &[u8], seed: u64) -> u64 {
    let mut hash = 0xcbf2_9ce4_8422_2325_u64 ^ seed;
    for &b in bytes {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

/// Embed `text` into a `dim`-dimensional, L2-normalized vector.
#[must_use]
pub fn embed_hashing_trick(text: &str, dim: usize) -> Vec<f32> {
    let mut acc = vec![0.0f32; dim];
    let tokens: Vec<&str> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();

    if tokens.is_empty() {
        // No tokenizable content (e.g. pure punctuation): fall back to a
        // whole-text hash so the vector is still well-defined.
        let h = fnv1a(text.as_bytes(), 0);
        acc[(h as usize) % dim] = 1.0;
        return l2_normalize(acc);
    }

    for token in &tokens {
        let lower = token.to_lowercase();
        let bytes = lower.as_bytes();
        let bucket_hash = fnv1a(bytes, 0);
        let sign_hash = fnv1a(bytes, 0x9E37_79B9_7F4A_7C15);
        let bucket = (bucket_hash as usize) % dim;
        let sign = if sign_hash & 1 == 0 { 1.0 } else { -1.0 };
        acc[bucket] += sign;
    }

    let count = tokens.len() as f32;
    for v in &mut acc {
        *v /= count;
    }

    l2_normalize(acc)
}
