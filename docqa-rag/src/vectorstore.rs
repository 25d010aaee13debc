//! Vector index trait for storing and searching chunk embeddings.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::Chunk;
use crate::error::Result;

/// A vector stored together with the chunk it was computed from, so a match
/// resolves to its citation without a second lookup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    /// L2-normalised embedding of `chunk.text`.
    pub vector: Vec<f32>,
    /// Copy of the chunk metadata.
    pub chunk: Chunk,
}

impl IndexEntry {
    pub fn new(vector: Vec<f32>, chunk: Chunk) -> Self {
        Self { vector, chunk }
    }
}

/// One nearest-neighbour match.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredEntry {
    /// Position of the entry in the index. Only stable until the next rebuild.
    pub id: usize,
    pub entry: IndexEntry,
    /// Cosine similarity to the query vector, in `[-1, 1]`.
    pub score: f32,
}

/// Chunk metadata and build state read under a single lock, so the parts
/// always describe the same index generation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexSnapshot {
    /// Chunk metadata of every entry in id order.
    pub chunks: Vec<Chunk>,
    pub built: bool,
    pub built_at: Option<DateTime<Utc>>,
}

/// A storage backend for chunk embeddings with similarity search.
///
/// Implementations hold an ordered list of [`IndexEntry`] whose position is
/// its internal id. Mutations (`add`, `rebuild`, `clear`, `load`) are
/// exclusive; searches may run concurrently with each other but never
/// observe a half-applied mutation. A mutation that fails validation leaves
/// the index exactly as it was.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{InMemoryVectorIndex, VectorIndex};
///
/// let index = InMemoryVectorIndex::new(384);
/// index.rebuild(entries).await?;
/// let matches = index.search(&query_vector, 5).await?;
/// ```
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Dimensionality every stored vector must have.
    fn dimensions(&self) -> usize;

    /// Append entries after the existing ones.
    ///
    /// Re-adding a chunk id creates a duplicate entry; deduplication is the
    /// caller's job. Fails with `DimensionMismatch` without modifying the
    /// index if any vector has the wrong length.
    async fn add(&self, entries: Vec<IndexEntry>) -> Result<()>;

    /// Return up to `k` entries ordered by descending score, ties broken by
    /// ascending internal id. An empty index yields an empty list.
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredEntry>>;

    /// Like [`search`](VectorIndex::search), but returns `None` when the index
    /// is unbuilt or empty. The check and the scoring see the same content.
    async fn search_if_built(&self, query: &[f32], k: usize) -> Result<Option<Vec<ScoredEntry>>>;

    /// Atomically replace the whole index content.
    async fn rebuild(&self, entries: Vec<IndexEntry>) -> Result<()>;

    /// Remove every entry and mark the index as unbuilt.
    async fn clear(&self) -> Result<()>;

    /// Number of stored entries.
    async fn count(&self) -> usize;

    /// Whether the index was built, loaded or added to since the last clear.
    async fn is_built(&self) -> bool;

    /// When the current content was last built.
    async fn built_at(&self) -> Option<DateTime<Utc>>;

    /// A consistent copy of every entry in id order.
    async fn entries(&self) -> Vec<IndexEntry>;

    /// Chunks and build state of one consistent index generation.
    async fn snapshot(&self) -> IndexSnapshot;

    /// Persist vectors and metadata to `path`.
    async fn save(&self, path: &Path) -> Result<()>;

    /// Replace the index content with the one persisted at `path`.
    ///
    /// Fails with `IncompatibleIndex` (leaving the current content untouched)
    /// if the file is unreadable, has an unknown format version or was
    /// written for a different dimensionality or model.
    async fn load(&self, path: &Path) -> Result<()>;
}
