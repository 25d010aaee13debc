//! Local document retrieval for question answering over PDFs.
//!
//! This crate provides:
//! - Word-window chunking of extracted page text with page attribution
//! - Sentence embeddings behind the [`EmbeddingProvider`] seam
//! - An exact in-memory vector index with JSON persistence
//! - Ranked, citable search through the [`KnowledgeBase`] orchestrator
//!
//! The ONNX sentence-transformer backend is behind the `onnx` feature.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use docqa_rag::{Document, HashingEmbeddingProvider, KnowledgeBase, Page, RagConfig};
//!
//! let kb = KnowledgeBase::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(HashingEmbeddingProvider::new()))
//!     .build()?;
//!
//! let doc = Document::from_filename("handbook.pdf", vec![Page::new(1, "Refunds take 14 days.")]);
//! kb.build_index(&[doc]).await?;
//!
//! for result in kb.search("how long do refunds take").await?.results() {
//!     println!("{} {:.3} {}", result.rank, result.score, result.citation());
//! }
//! ```

pub mod chunking;
pub mod citation;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod hashing;
pub mod inmemory;
pub mod knowledge_base;
pub mod persistence;
pub mod search;
pub mod vectorstore;

#[cfg(feature = "onnx")]
pub mod onnx;

pub use chunking::{Chunker, WordWindowChunker};
pub use citation::{Citation, highlight_keywords};
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{Chunk, Document, Page, SearchHit, SearchResult, document_id_for};
pub use embedding::{EMBEDDING_DIM, Embedder, EmbeddingProvider, normalize};
pub use error::{RagError, Result};
pub use hashing::HashingEmbeddingProvider;
pub use inmemory::InMemoryVectorIndex;
pub use knowledge_base::{IndexStats, IndexedDocument, KnowledgeBase, KnowledgeBaseBuilder};
pub use persistence::{FORMAT_VERSION, PersistedIndex};
pub use search::{SearchEngine, SearchOutcome};
pub use vectorstore::{IndexEntry, IndexSnapshot, ScoredEntry, VectorIndex};

#[cfg(feature = "onnx")]
pub use onnx::{DEFAULT_MODEL_REPO, OnnxEmbeddingProvider};
