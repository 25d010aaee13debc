//! Error types for the `docqa-rag` crate.

use thiserror::Error;

/// Errors that can occur in retrieval operations.
///
/// "No index built yet" and "no results" are not errors; see
/// [`SearchOutcome`](crate::search::SearchOutcome).
#[derive(Debug, Error)]
pub enum RagError {
    /// The embedding backend could not be initialised.
    ///
    /// Raised at startup; no search is possible without a model.
    #[error("Embedding model unavailable ({model}): {message}")]
    ModelUnavailable {
        /// The model that failed to load.
        model: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A vector did not have the dimensionality the index expects.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The index dimensionality.
        expected: usize,
        /// The offending vector's length.
        actual: usize,
    },

    /// A persisted index is unreadable or was written in an incompatible format.
    #[error("Incompatible index: {0}")]
    IncompatibleIndex(String),

    /// Window/overlap settings produce a non-positive step size.
    #[error("Chunking configuration error: {0}")]
    ChunkingConfigError(String),

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// An error in the knowledge base orchestration.
    #[error("Pipeline error: {0}")]
    PipelineError(String),

    /// An I/O error while reading or writing index files.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A convenience result type for retrieval operations.
pub type Result<T> = std::result::Result<T, RagError>;
