//! In-memory exact vector index using cosine similarity.
//!
//! [`InMemoryVectorIndex`] scores every stored vector against the query
//! (a flat inner-product index). At the scale of a single user's document
//! collection this is fast enough and gives exact, deterministic rankings.

use std::cmp::Ordering;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::error::{RagError, Result};
use crate::persistence::PersistedIndex;
use crate::vectorstore::{IndexEntry, IndexSnapshot, ScoredEntry, VectorIndex};

#[derive(Debug, Default)]
struct IndexState {
    entries: Vec<IndexEntry>,
    built: bool,
    built_at: Option<DateTime<Utc>>,
}

/// A flat in-memory vector index.
///
/// Entries live in a `Vec` behind a `tokio::sync::RwLock`: searches share the
/// read lock, mutations take the write lock. Replacement content is fully
/// validated before the write lock is taken, so a failed mutation never
/// touches the visible state.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{InMemoryVectorIndex, VectorIndex};
///
/// let index = InMemoryVectorIndex::new(384).with_model("all-MiniLM-L6-v2");
/// index.rebuild(entries).await?;
/// ```
#[derive(Debug)]
pub struct InMemoryVectorIndex {
    dimensions: usize,
    model: Option<String>,
    state: RwLock<IndexState>,
}

impl InMemoryVectorIndex {
    /// Create an empty, unbuilt index for vectors of `dimensions` floats.
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions, model: None, state: RwLock::new(IndexState::default()) }
    }

    /// Tie the index to an embedding model.
    ///
    /// The name is written into saved files, and files written for a different
    /// model are refused on load.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    fn check_query(&self, query: &[f32]) -> Result<()> {
        if query.len() != self.dimensions {
            return Err(RagError::DimensionMismatch {
                expected: self.dimensions,
                actual: query.len(),
            });
        }
        Ok(())
    }

    fn check_dimensions(&self, entries: &[IndexEntry]) -> Result<()> {
        match entries.iter().find(|e| e.vector.len() != self.dimensions) {
            Some(bad) => {
                error!(
                    chunk.id = %bad.chunk.chunk_id,
                    expected = self.dimensions,
                    actual = bad.vector.len(),
                    "rejecting entries with wrong dimensionality"
                );
                Err(RagError::DimensionMismatch {
                    expected: self.dimensions,
                    actual: bad.vector.len(),
                })
            }
            None => Ok(()),
        }
    }
}

/// The `k` best entries in rank order.
fn top_k(entries: &[IndexEntry], query: &[f32], k: usize) -> Vec<ScoredEntry> {
    if k == 0 || entries.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<(usize, f32)> = entries
        .iter()
        .enumerate()
        .map(|(id, entry)| (id, dot(&entry.vector, query).clamp(-1.0, 1.0)))
        .collect();

    if k < scored.len() {
        scored.select_nth_unstable_by(k - 1, by_rank);
        scored.truncate(k);
    }
    scored.sort_by(by_rank);

    scored
        .into_iter()
        .map(|(id, score)| ScoredEntry { id, entry: entries[id].clone(), score })
        .collect()
}

/// Dot product of two equally long vectors, i.e. cosine similarity for unit vectors.
fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Higher score first, then lower id.
fn by_rank(a: &(usize, f32), b: &(usize, f32)) -> Ordering {
    b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0))
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn add(&self, entries: Vec<IndexEntry>) -> Result<()> {
        self.check_dimensions(&entries)?;
        let added = entries.len();

        let mut state = self.state.write().await;
        state.entries.extend(entries);
        state.built = true;
        state.built_at = Some(Utc::now());
        info!(added, total = state.entries.len(), "added entries to index");
        Ok(())
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredEntry>> {
        self.check_query(query)?;
        let state = self.state.read().await;
        Ok(top_k(&state.entries, query, k))
    }

    async fn search_if_built(&self, query: &[f32], k: usize) -> Result<Option<Vec<ScoredEntry>>> {
        self.check_query(query)?;
        let state = self.state.read().await;
        if !state.built || state.entries.is_empty() {
            return Ok(None);
        }
        Ok(Some(top_k(&state.entries, query, k)))
    }

    async fn rebuild(&self, entries: Vec<IndexEntry>) -> Result<()> {
        self.check_dimensions(&entries)?;

        let mut state = self.state.write().await;
        *state = IndexState { entries, built: true, built_at: Some(Utc::now()) };
        info!(total = state.entries.len(), "rebuilt index");
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let mut state = self.state.write().await;
        *state = IndexState::default();
        info!("cleared index");
        Ok(())
    }

    async fn count(&self) -> usize {
        self.state.read().await.entries.len()
    }

    async fn is_built(&self) -> bool {
        self.state.read().await.built
    }

    async fn built_at(&self) -> Option<DateTime<Utc>> {
        self.state.read().await.built_at
    }

    async fn entries(&self) -> Vec<IndexEntry> {
        self.state.read().await.entries.clone()
    }

    async fn snapshot(&self) -> IndexSnapshot {
        let state = self.state.read().await;
        IndexSnapshot {
            chunks: state.entries.iter().map(|e| e.chunk.clone()).collect(),
            built: state.built,
            built_at: state.built_at,
        }
    }

    async fn save(&self, path: &Path) -> Result<()> {
        let persisted = {
            let state = self.state.read().await;
            PersistedIndex::from_entries(
                self.dimensions,
                self.model.clone(),
                state.built_at,
                &state.entries,
            )
        };
        persisted.write(path).await?;
        info!(path = %path.display(), total = persisted.vectors.len(), "saved index");
        Ok(())
    }

    async fn load(&self, path: &Path) -> Result<()> {
        let persisted = PersistedIndex::read(path).await.map_err(|e| {
            error!(path = %path.display(), error = %e, "failed to read index file");
            e
        })?;

        if let (Some(expected), Some(found)) = (&self.model, &persisted.model) {
            if expected != found {
                warn!(
                    path = %path.display(),
                    expected = %expected,
                    found = %found,
                    "index was built with another model"
                );
                return Err(RagError::IncompatibleIndex(format!(
                    "index was built with model '{found}', current model is '{expected}'"
                )));
            }
        }

        let built_at = persisted.built_at;
        let entries = persisted.into_entries(self.dimensions)?;

        let mut state = self.state.write().await;
        *state = IndexState { entries, built: true, built_at };
        info!(path = %path.display(), total = state.entries.len(), "loaded index");
        Ok(())
    }
}
