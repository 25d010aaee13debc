//! Data types for documents, chunks, and search results.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::citation::Citation;

/// The text extracted from one page of a source document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page {
    /// 1-based page number as printed by the extractor.
    pub page_number: u32,
    /// Raw extracted text; may be empty.
    pub text: String,
}

impl Page {
    /// Create a page from its number and text.
    pub fn new(page_number: u32, text: impl Into<String>) -> Self {
        Self { page_number, text: text.into() }
    }
}

/// A source document as handed over by the text extractor.
///
/// Documents are immutable once created; chunks copy whatever they need from
/// them so the index never refers back to a live `Document`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier for the document.
    pub id: String,
    /// Name of the uploaded file, used in citations.
    pub filename: String,
    /// Pages in reading order.
    pub pages: Vec<Page>,
}

impl Document {
    /// Create a document with an explicit identifier.
    pub fn new(id: impl Into<String>, filename: impl Into<String>, pages: Vec<Page>) -> Self {
        Self { id: id.into(), filename: filename.into(), pages }
    }

    /// Create a document whose identifier is derived from its filename.
    ///
    /// The same filename always yields the same id, so re-uploading a file
    /// replaces its previous passages on the next rebuild.
    pub fn from_filename(filename: impl Into<String>, pages: Vec<Page>) -> Self {
        let filename = filename.into();
        Self { id: document_id_for(&filename), filename, pages }
    }
}

/// Derive a stable 12 hex character identifier from a filename.
pub fn document_id_for(filename: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(filename.as_bytes());
    let hash = format!("{:x}", hasher.finalize());
    hash.chars().take(12).collect()
}

/// A page-bounded passage of a [`Document`].
///
/// Field names on the wire follow the index persistence format
/// (`chunk_text`, `chunk_sequence`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Unique identifier, `{document_id}_{sequence_index}`.
    pub chunk_id: String,
    /// The ID of the parent [`Document`].
    pub document_id: String,
    /// Filename of the parent document.
    pub filename: String,
    /// The single page this passage was cut from.
    pub page_number: u32,
    /// Passage text: the window's words joined by single spaces.
    #[serde(rename = "chunk_text")]
    pub text: String,
    /// Position of this chunk within its document.
    #[serde(rename = "chunk_sequence")]
    pub sequence_index: usize,
}

impl Chunk {
    /// The (document, page) provenance of this chunk.
    pub fn citation(&self) -> Citation {
        Citation { filename: self.filename.clone(), page: self.page_number }
    }
}

/// A retrieved [`Chunk`] paired with its similarity score and 1-based rank.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// Cosine similarity to the query, in `[-1, 1]`.
    pub score: f32,
    /// 1-based position in the result list.
    pub rank: usize,
}

impl SearchResult {
    /// The (document, page) provenance of this result.
    pub fn citation(&self) -> Citation {
        self.chunk.citation()
    }

    /// Flatten into the record returned by the query interface.
    pub fn to_hit(&self) -> SearchHit {
        SearchHit {
            document: self.chunk.filename.clone(),
            page: self.chunk.page_number,
            text: self.chunk.text.clone(),
            score: self.score,
            rank: self.rank,
        }
    }
}

/// Flat query-interface record: `{document, page, text, score, rank}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    pub document: String,
    pub page: u32,
    pub text: String,
    pub score: f32,
    pub rank: usize,
}
