//! Text embedding: the [`EmbeddingProvider`] model seam and the batching
//! [`Embedder`] built on top of it.
//!
//! A provider wraps one loaded model. It is constructed once at startup,
//! shared behind an `Arc` for the rest of the process and passed explicitly
//! to [`Embedder::new`]; nothing in this crate keeps a global model instance.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use tracing::{debug, error};

use crate::error::{RagError, Result};

/// Dimensionality of the sentence-embedding models this crate targets.
pub const EMBEDDING_DIM: usize = 384;

/// A provider that generates vector embeddings from text input.
///
/// Implementations must be deterministic: the same text always maps to the
/// same vector. The default [`embed_batch`](EmbeddingProvider::embed_batch)
/// implementation calls [`embed`](EmbeddingProvider::embed) sequentially;
/// backends that support native batching should override it.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::EmbeddingProvider;
///
/// let provider = MyEmbeddingProvider::new();
/// let embedding = provider.embed("hello world").await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs.
    ///
    /// Output `i` must correspond to input `i`.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;

    /// Identifier of the underlying model, recorded in persisted indexes.
    fn model_name(&self) -> &str;
}

/// L2-normalise `vector` in place. Zero vectors are left unchanged.
pub fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        vector.iter_mut().for_each(|x| *x /= norm);
    }
}

/// Order-preserving, batching wrapper around an [`EmbeddingProvider`].
///
/// Inputs are split into batches of `batch_size` texts that are embedded
/// concurrently. Every returned vector is L2-normalised and checked against
/// the provider's dimensionality, so cosine similarity between any two
/// outputs is a plain dot product.
#[derive(Clone)]
pub struct Embedder {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
}

impl std::fmt::Debug for Embedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Embedder")
            .field("model", &self.provider.model_name())
            .field("dimensions", &self.provider.dimensions())
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl Embedder {
    /// Default number of texts per provider call.
    pub const DEFAULT_BATCH_SIZE: usize = 32;

    /// Wrap an already-loaded provider.
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self { provider, batch_size: Self::DEFAULT_BATCH_SIZE }
    }

    /// Set the number of texts per provider call. Zero is treated as one.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn dimensions(&self) -> usize {
        self.provider.dimensions()
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    /// Embed `texts`, returning one normalised vector per input in input order.
    ///
    /// # Errors
    ///
    /// Fails as a whole if any batch fails; no partial output is returned.
    pub async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let batches = texts.chunks(self.batch_size);
        debug!(
            model = self.provider.model_name(),
            text_count = texts.len(),
            batch_count = batches.len(),
            "embedding texts"
        );

        let outputs = try_join_all(batches.map(|batch| self.embed_checked(batch))).await?;
        Ok(outputs.into_iter().flatten().collect())
    }

    /// Embed a single text. Identical to `embed(&[text])[0]`.
    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_checked(&[text]).await?;
        vectors.pop().ok_or_else(|| RagError::EmbeddingError {
            provider: self.provider.model_name().to_string(),
            message: "provider returned no vector".to_string(),
        })
    }

    async fn embed_checked(&self, batch: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = self.provider.embed_batch(batch).await?;

        if vectors.len() != batch.len() {
            error!(
                model = self.provider.model_name(),
                expected = batch.len(),
                actual = vectors.len(),
                "provider returned wrong number of vectors"
            );
            return Err(RagError::EmbeddingError {
                provider: self.provider.model_name().to_string(),
                message: format!(
                    "expected {} vectors, provider returned {}",
                    batch.len(),
                    vectors.len()
                ),
            });
        }

        let expected = self.provider.dimensions();
        for vector in &mut vectors {
            if vector.len() != expected {
                return Err(RagError::DimensionMismatch { expected, actual: vector.len() });
            }
            normalize(vector);
        }
        Ok(vectors)
    }
}
