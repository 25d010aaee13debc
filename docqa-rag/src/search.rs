//! Query execution: embed the query, look up nearest neighbours, rank.

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::config::{RagConfig, validate_min_score};
use crate::document::SearchResult;
use crate::embedding::Embedder;
use crate::error::{RagError, Result};
use crate::vectorstore::VectorIndex;

/// The result of a query.
///
/// `NoIndex` means nothing has been indexed yet; it is distinct from a
/// `Results` list that happens to be empty because nothing cleared
/// `min_score`.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// The index is empty or has never been built.
    NoIndex,
    /// Ranked results, best first. May be empty.
    Results(Vec<SearchResult>),
}

impl SearchOutcome {
    /// The ranked results, or an empty slice for [`SearchOutcome::NoIndex`].
    pub fn results(&self) -> &[SearchResult] {
        match self {
            Self::NoIndex => &[],
            Self::Results(results) => results,
        }
    }

    pub fn into_results(self) -> Vec<SearchResult> {
        match self {
            Self::NoIndex => Vec::new(),
            Self::Results(results) => results,
        }
    }

    pub fn is_no_index(&self) -> bool {
        matches!(self, Self::NoIndex)
    }
}

/// Answers free-text queries against a [`VectorIndex`].
///
/// Results are deterministic for a fixed index and model.
pub struct SearchEngine {
    embedder: Embedder,
    index: Arc<dyn VectorIndex>,
    config: RagConfig,
}

impl SearchEngine {
    pub fn new(embedder: Embedder, index: Arc<dyn VectorIndex>, config: RagConfig) -> Self {
        Self { embedder, index, config }
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Query with the configured `top_k` and `min_score`.
    pub async fn search(&self, text: &str) -> Result<SearchOutcome> {
        self.query(text, self.config.top_k, self.config.min_score).await
    }

    /// Return at most `k` passages scoring at least `min_score`, ranked from 1.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `k == 0` or `min_score` is not a
    /// finite value in `[-1, 1]`, and propagates embedding
    /// failures. An empty or unbuilt index is reported as
    /// [`SearchOutcome::NoIndex`], not as an error.
    pub async fn query(&self, text: &str, k: usize, min_score: f32) -> Result<SearchOutcome> {
        if k == 0 {
            return Err(RagError::ConfigError("k must be at least 1".to_string()));
        }
        validate_min_score(min_score)?;

        if !self.index.is_built().await || self.index.count().await == 0 {
            debug!("query against empty index");
            return Ok(SearchOutcome::NoIndex);
        }

        let text = text.trim();
        if text.is_empty() {
            return Ok(SearchOutcome::Results(Vec::new()));
        }

        let query_vector = self.embedder.embed_one(text).await.map_err(|e| {
            error!(error = %e, "embedding failed during query");
            e
        })?;

        // A reset may have landed while the query was being embedded.
        let Some(matches) = self.index.search_if_built(&query_vector, k).await? else {
            debug!("index emptied during query");
            return Ok(SearchOutcome::NoIndex);
        };
        let results: Vec<SearchResult> = matches
            .into_iter()
            .filter(|m| m.score >= min_score)
            .enumerate()
            .map(|(position, m)| SearchResult {
                chunk: m.entry.chunk,
                score: m.score,
                rank: position + 1,
            })
            .collect();

        info!(k, min_score, result_count = results.len(), "query completed");
        Ok(SearchOutcome::Results(results))
    }
}
