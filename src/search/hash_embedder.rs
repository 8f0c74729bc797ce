//! FNV-1a feature hashing embedder (deterministic fallback).
//!
//! Produces a fixed-dimension lexical embedding with no model files: each
//! token (and adjacent token bigram) is hashed with FNV-1a into a bucket, with
//! a sign bit taken from the hash to keep the expected bucket sum centered at
//! zero. The output is L2-normalized.
//!
//! Quality is far below an ML encoder, but the mapping is bit-for-bit
//! deterministic across platforms, which makes it the encoder of choice for
//! tests and for hosts without model files.

use super::embedder::{Embedder, EmbedderResult, l2_normalize};

pub const HASH_EMBEDDER_ID: &str = "fnv1a-384";
pub const HASH_DIMENSION: usize = 384;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self {
            dimension: HASH_DIMENSION,
        }
    }
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn accumulate(&self, token: &str, vector: &mut [f32]) {
        let hash = fnv1a(token.as_bytes());
        let bucket = (hash % self.dimension as u64) as usize;
        // One hash bit as the sign keeps bucket collisions from only adding up.
        let sign = if hash & (1 << 63) == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign;
    }
}

impl Embedder for HashEmbedder {
    fn id(&self) -> &str {
        HASH_EMBEDDER_ID
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn is_semantic(&self) -> bool {
        false
    }

    fn embed(&self, text: &str) -> EmbedderResult<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimension];
        let tokens: Vec<String> = tokenize(text).collect();

        for token in &tokens {
            self.accumulate(token, &mut vector);
        }
        // Bigrams capture a little word order ("java developer" vs
        // "developer java" share unigrams but not bigrams).
        for pair in tokens.windows(2) {
            self.accumulate(&format!("{} {}", pair[0], pair[1]), &mut vector);
        }

        l2_normalize(&mut vector);
        Ok(vector)
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}
