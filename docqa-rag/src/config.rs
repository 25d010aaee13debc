//! Configuration for chunking, embedding and retrieval.

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Configuration parameters for the retrieval pipeline.
///
/// Construct a validated value with [`RagConfig::builder()`]. Values obtained
/// any other way (e.g. deserialized from a file) should be checked with
/// [`RagConfig::validate`] before use.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RagConfig {
    /// Passage length in words.
    pub window_size: usize,
    /// Number of words shared between consecutive passages of the same page.
    pub overlap: usize,
    /// Maximum number of results per query.
    pub top_k: usize,
    /// Similarity floor; results scoring below it are discarded.
    pub min_score: f32,
    /// Number of texts sent to the embedding model per batch.
    pub embed_batch_size: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self { window_size: 300, overlap: 50, top_k: 5, min_score: 0.0, embed_batch_size: 32 }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Words advanced between the starts of two consecutive windows.
    pub fn step_size(&self) -> usize {
        self.window_size.saturating_sub(self.overlap)
    }

    /// Check that all parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ChunkingConfigError`] if `window_size == 0` or
    /// `overlap >= window_size`, and [`RagError::ConfigError`] if
    /// `top_k == 0`, `embed_batch_size == 0` or `min_score` is not a finite
    /// value in `[-1, 1]`.
    pub fn validate(&self) -> Result<()> {
        validate_window(self.window_size, self.overlap)?;
        if self.top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }
        validate_min_score(self.min_score)?;
        if self.embed_batch_size == 0 {
            return Err(RagError::ConfigError(
                "embed_batch_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Reject window settings whose step size would be zero.
pub(crate) fn validate_window(window_size: usize, overlap: usize) -> Result<()> {
    if window_size == 0 {
        return Err(RagError::ChunkingConfigError(
            "window_size must be greater than zero".to_string(),
        ));
    }
    if overlap >= window_size {
        return Err(RagError::ChunkingConfigError(format!(
            "overlap ({overlap}) must be less than window_size ({window_size})"
        )));
    }
    Ok(())
}

/// Reject similarity floors outside the cosine range, including NaN.
pub(crate) fn validate_min_score(min_score: f32) -> Result<()> {
    if !(-1.0..=1.0).contains(&min_score) {
        return Err(RagError::ConfigError(format!(
            "min_score ({min_score}) must be a finite value in [-1, 1]"
        )));
    }
    Ok(())
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the passage length in words.
    pub fn window_size(mut self, words: usize) -> Self {
        self.config.window_size = words;
        self
    }

    /// Set the overlap between consecutive passages in words.
    pub fn overlap(mut self, words: usize) -> Self {
        self.config.overlap = words;
        self
    }

    /// Set the maximum number of results per query.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the minimum similarity score.
    pub fn min_score(mut self, score: f32) -> Self {
        self.config.min_score = score;
        self
    }

    /// Set the embedding batch size.
    pub fn embed_batch_size(mut self, size: usize) -> Self {
        self.config.embed_batch_size = size;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// See [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
