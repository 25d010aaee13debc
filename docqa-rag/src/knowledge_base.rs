//! Knowledge base orchestrator.
//!
//! The [`KnowledgeBase`] drives chunk → embed → rebuild for a batch of
//! documents, answers queries through its [`SearchEngine`], and optionally
//! keeps the index persisted on disk.
//!
//! # Example
//!
//! ```rust,ignore
//! use docqa_rag::{HashingEmbeddingProvider, KnowledgeBase, RagConfig};
//!
//! let kb = KnowledgeBase::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(HashingEmbeddingProvider::new()))
//!     .index_path("index/docqa.json")
//!     .build()?;
//!
//! kb.open().await?;
//! kb.build_index(&documents).await?;
//! let outcome = kb.search("what is the refund policy?").await?;
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::chunking::{Chunker, WordWindowChunker};
use crate::config::RagConfig;
use crate::document::{Chunk, Document};
use crate::embedding::{Embedder, EmbeddingProvider};
use crate::error::{RagError, Result};
use crate::inmemory::InMemoryVectorIndex;
use crate::search::{SearchEngine, SearchOutcome};
use crate::vectorstore::{IndexEntry, VectorIndex};

/// One indexed document as listed by [`IndexStats`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexedDocument {
    pub id: String,
    pub filename: String,
    pub chunk_count: usize,
}

/// Summary of the current index content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexStats {
    /// Number of distinct documents with at least one chunk in the index.
    pub document_count: usize,
    /// Number of indexed chunks.
    pub chunk_count: usize,
    /// Whether an index has been built or loaded since the last reset.
    pub built: bool,
    pub built_at: Option<DateTime<Utc>>,
    pub embedding_dim: usize,
    /// Indexed documents sorted by filename, then id.
    pub documents: Vec<IndexedDocument>,
}

impl IndexStats {
    /// Filenames of the indexed documents, in listing order.
    pub fn filenames(&self) -> Vec<&str> {
        self.documents.iter().map(|d| d.filename.as_str()).collect()
    }
}

/// Coordinates chunking, embedding and index rebuilds for a document set.
///
/// Every content change is a full rebuild of the index, so the index always
/// corresponds to exactly one document set. Builds are serialised; searches
/// keep running against the previous content until a rebuild is swapped in.
/// Construct one via [`KnowledgeBase::builder()`].
pub struct KnowledgeBase {
    config: RagConfig,
    chunker: Arc<dyn Chunker>,
    embedder: Embedder,
    index: Arc<dyn VectorIndex>,
    engine: SearchEngine,
    index_path: Option<PathBuf>,
    build_lock: Mutex<()>,
}

impl KnowledgeBase {
    /// Create a new [`KnowledgeBaseBuilder`].
    pub fn builder() -> KnowledgeBaseBuilder {
        KnowledgeBaseBuilder::default()
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    pub fn search_engine(&self) -> &SearchEngine {
        &self.engine
    }

    pub fn index_path(&self) -> Option<&Path> {
        self.index_path.as_deref()
    }

    /// Load the persisted index if a path is configured and the file exists.
    ///
    /// Returns whether an index was loaded.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::IncompatibleIndex`] if the file exists but cannot
    /// be used; the in-memory index is left empty in that case.
    pub async fn open(&self) -> Result<bool> {
        let Some(path) = &self.index_path else {
            return Ok(false);
        };
        if !tokio::fs::try_exists(path).await? {
            info!(path = %path.display(), "no persisted index found");
            return Ok(false);
        }
        self.index.load(path).await?;
        Ok(true)
    }

    /// Replace the index with the chunks of `documents`.
    ///
    /// Nothing is committed unless every chunk was embedded successfully.
    /// When several documents share an id, the last one wins.
    pub async fn build_index(&self, documents: &[Document]) -> Result<IndexStats> {
        let _guard = self.build_lock.lock().await;

        let entries = self.embed_documents(documents).await?;
        if entries.is_empty() {
            warn!(document_count = documents.len(), "no extractable text; index will be empty");
        }
        self.commit(entries).await?;

        let stats = self.stats().await;
        info!(
            document_count = stats.document_count,
            chunk_count = stats.chunk_count,
            "built index"
        );
        Ok(stats)
    }

    /// Add `documents` to the indexed set, replacing earlier versions that
    /// share a document id.
    pub async fn add_documents(&self, documents: &[Document]) -> Result<IndexStats> {
        let _guard = self.build_lock.lock().await;

        let new_entries = self.embed_documents(documents).await?;
        let replaced: HashSet<&str> = documents.iter().map(|d| d.id.as_str()).collect();

        let mut entries: Vec<IndexEntry> = self
            .index
            .entries()
            .await
            .into_iter()
            .filter(|e| !replaced.contains(e.chunk.document_id.as_str()))
            .collect();
        entries.extend(new_entries);
        self.commit(entries).await?;

        let stats = self.stats().await;
        info!(
            added = documents.len(),
            document_count = stats.document_count,
            chunk_count = stats.chunk_count,
            "added documents"
        );
        Ok(stats)
    }

    /// Find the id of an indexed document by id or by filename.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::PipelineError`] if nothing matches, or if the key
    /// is a filename shared by several indexed documents.
    pub async fn resolve_document(&self, key: &str) -> Result<String> {
        let stats = self.stats().await;
        if let Some(doc) = stats.documents.iter().find(|d| d.id == key) {
            return Ok(doc.id.clone());
        }

        let matches: Vec<&IndexedDocument> =
            stats.documents.iter().filter(|d| d.filename == key).collect();
        match matches.as_slice() {
            [doc] => Ok(doc.id.clone()),
            [] => Err(RagError::PipelineError(format!("document '{key}' is not indexed"))),
            _ => Err(RagError::PipelineError(format!(
                "'{key}' names {} documents; remove one by id",
                matches.len()
            ))),
        }
    }

    /// Drop every chunk of `document_id` from the index.
    ///
    /// Returns [`RagError::PipelineError`] if the document is not indexed.
    pub async fn remove_document(&self, document_id: &str) -> Result<IndexStats> {
        let _guard = self.build_lock.lock().await;

        let entries = self.index.entries().await;
        let before = entries.len();
        let kept: Vec<IndexEntry> =
            entries.into_iter().filter(|e| e.chunk.document_id != document_id).collect();
        if kept.len() == before {
            return Err(RagError::PipelineError(format!(
                "document '{document_id}' is not indexed"
            )));
        }
        let removed = before - kept.len();
        self.commit(kept).await?;

        info!(document.id = document_id, removed, "removed document");
        Ok(self.stats().await)
    }

    /// Current index statistics, taken from a single index generation.
    pub async fn stats(&self) -> IndexStats {
        let snapshot = self.index.snapshot().await;

        let mut documents: BTreeMap<(&str, &str), usize> = BTreeMap::new();
        for chunk in &snapshot.chunks {
            let key = (chunk.filename.as_str(), chunk.document_id.as_str());
            *documents.entry(key).or_default() += 1;
        }

        IndexStats {
            document_count: documents.len(),
            chunk_count: snapshot.chunks.len(),
            built: snapshot.built,
            built_at: snapshot.built_at,
            embedding_dim: self.index.dimensions(),
            documents: documents
                .into_iter()
                .map(|((filename, id), chunk_count)| IndexedDocument {
                    id: id.to_string(),
                    filename: filename.to_string(),
                    chunk_count,
                })
                .collect(),
        }
    }

    /// Delete the persisted file, if any, then empty the index.
    ///
    /// If the file cannot be deleted the in-memory index is left as it was.
    pub async fn reset(&self) -> Result<()> {
        let _guard = self.build_lock.lock().await;

        if let Some(path) = &self.index_path {
            match tokio::fs::remove_file(path).await {
                Ok(()) => info!(path = %path.display(), "deleted persisted index"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    error!(path = %path.display(), error = %e, "failed to delete persisted index");
                    return Err(e.into());
                }
            }
        }
        self.index.clear().await
    }

    /// Query with the configured `top_k` and `min_score`.
    pub async fn search(&self, query: &str) -> Result<SearchOutcome> {
        self.engine.search(query).await
    }

    /// Query with explicit `k` and `min_score`.
    pub async fn query(&self, query: &str, k: usize, min_score: f32) -> Result<SearchOutcome> {
        self.engine.query(query, k, min_score).await
    }

    async fn embed_documents(&self, documents: &[Document]) -> Result<Vec<IndexEntry>> {
        let chunks: Vec<Chunk> =
            latest_versions(documents).into_iter().flat_map(|d| self.chunker.chunk(d)).collect();
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let vectors = self.embedder.embed(&texts).await.map_err(|e| {
            error!(chunk_count = chunks.len(), error = %e, "embedding failed; nothing committed");
            e
        })?;

        Ok(vectors
            .into_iter()
            .zip(chunks)
            .map(|(vector, chunk)| IndexEntry { vector, chunk })
            .collect())
    }

    async fn commit(&self, entries: Vec<IndexEntry>) -> Result<()> {
        self.index.rebuild(entries).await?;
        if let Some(path) = &self.index_path {
            self.index.save(path).await.map_err(|e| {
                error!(path = %path.display(), error = %e, "failed to persist rebuilt index");
                e
            })?;
        }
        Ok(())
    }
}

/// Keep only the last document for each id, in the order those last
/// occurrences appear.
fn latest_versions(documents: &[Document]) -> Vec<&Document> {
    let mut seen = HashSet::new();
    let mut latest: Vec<&Document> =
        documents.iter().rev().filter(|d| seen.insert(d.id.as_str())).collect();
    latest.reverse();

    if latest.len() < documents.len() {
        warn!(
            duplicates = documents.len() - latest.len(),
            "documents share an id; keeping the last of each"
        );
    }
    latest
}

/// Builder for constructing a [`KnowledgeBase`].
///
/// `config` and `embedding_provider` are required. The chunker defaults to a
/// [`WordWindowChunker`] from the config, and the index to an
/// [`InMemoryVectorIndex`] tied to the provider's model.
#[derive(Default)]
pub struct KnowledgeBaseBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_index: Option<Arc<dyn VectorIndex>>,
    chunker: Option<Arc<dyn Chunker>>,
    index_path: Option<PathBuf>,
}

impl KnowledgeBaseBuilder {
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the loaded embedding model shared with the search engine.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    pub fn vector_index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.vector_index = Some(index);
        self
    }

    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Persist the index to this file after every rebuild.
    pub fn index_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.index_path = Some(path.into());
        self
    }

    /// Build the [`KnowledgeBase`], validating the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ChunkingConfigError`] or [`RagError::ConfigError`]
    /// for invalid settings or a missing required component, and
    /// [`RagError::DimensionMismatch`] if the index and the embedding model
    /// disagree on dimensionality.
    pub fn build(self) -> Result<KnowledgeBase> {
        let config =
            self.config.ok_or_else(|| RagError::ConfigError("config is required".to_string()))?;
        config.validate()?;

        let provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;

        let chunker = match self.chunker {
            Some(chunker) => chunker,
            None => Arc::new(WordWindowChunker::from_config(&config)?),
        };

        let index = self.vector_index.unwrap_or_else(|| {
            Arc::new(
                InMemoryVectorIndex::new(provider.dimensions()).with_model(provider.model_name()),
            )
        });
        if index.dimensions() != provider.dimensions() {
            return Err(RagError::DimensionMismatch {
                expected: index.dimensions(),
                actual: provider.dimensions(),
            });
        }

        let embedder = Embedder::new(provider).with_batch_size(config.embed_batch_size);
        let engine = SearchEngine::new(embedder.clone(), Arc::clone(&index), config.clone());

        Ok(KnowledgeBase {
            config,
            chunker,
            embedder,
            index,
            engine,
            index_path: self.index_path,
            build_lock: Mutex::new(()),
        })
    }
}
