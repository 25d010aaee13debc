//! Offline lexical embedding provider based on signed feature hashing.
//!
//! Needs no model files or network access, which makes it the default backend
//! for the CLI and the backend used throughout the tests. Similarity reflects
//! shared vocabulary rather than meaning; use the `onnx` feature for semantic
//! embeddings.

use async_trait::async_trait;

use crate::embedding::{EMBEDDING_DIM, EmbeddingProvider, normalize};
use crate::error::Result;

const MODEL_NAME: &str = "feature-hash-v1";

/// Weight of a word bigram relative to a single word.
const BIGRAM_WEIGHT: f32 = 0.5;

/// Deterministic bag-of-words embedder.
///
/// Each lower-cased alphanumeric word (and each adjacent word pair) is hashed
/// with 64-bit FNV-1a; the hash picks a dimension and a sign. The resulting
/// vector is L2-normalised. Text without any word maps to a fixed unit vector.
#[derive(Debug, Clone)]
pub struct HashingEmbeddingProvider {
    dimensions: usize,
}

impl Default for HashingEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl HashingEmbeddingProvider {
    /// Create a provider producing [`EMBEDDING_DIM`]-dimensional vectors.
    pub fn new() -> Self {
        Self { dimensions: EMBEDDING_DIM }
    }

    /// Create a provider with a custom dimensionality (at least 1).
    pub fn with_dimensions(dimensions: usize) -> Self {
        Self { dimensions: dimensions.max(1) }
    }

    fn accumulate(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let hash = fnv1a(feature.as_bytes());
        let slot = (hash % self.dimensions as u64) as usize;
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        vector[slot] += sign * weight;
    }

    fn encode(&self, text: &str) -> Vec<f32> {
        let tokens: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
            .collect();

        let mut vector = vec![0.0f32; self.dimensions];
        for token in &tokens {
            self.accumulate(&mut vector, token, 1.0);
        }
        for pair in tokens.windows(2) {
            self.accumulate(&mut vector, &format!("{} {}", pair[0], pair[1]), BIGRAM_WEIGHT);
        }

        // Colliding signs can cancel out completely.
        if vector.iter().all(|x| *x == 0.0) {
            vector[0] = 1.0;
        }
        normalize(&mut vector);
        vector
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    bytes.iter().fold(OFFSET_BASIS, |hash, b| (hash ^ u64::from(*b)).wrapping_mul(PRIME))
}

#[async_trait]
impl EmbeddingProvider for HashingEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.encode(text))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.encode(text)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        MODEL_NAME
    }
}
