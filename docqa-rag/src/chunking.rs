//! Document chunking.
//!
//! This module provides the [`Chunker`] trait and [`WordWindowChunker`], which
//! cuts each page into overlapping word windows. Windows never cross a page
//! boundary, so every chunk cites exactly one page.

use tracing::debug;

use crate::config::{RagConfig, validate_window};
use crate::document::{Chunk, Document};
use crate::error::Result;

/// A strategy for splitting documents into chunks.
///
/// Implementations are pure: the same document always yields the same chunks
/// in the same order.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks, ordered by `(page_number, sequence_index)`.
    ///
    /// Pages without extractable words contribute no chunks.
    fn chunk(&self, document: &Document) -> Vec<Chunk>;
}

/// Splits every page into word windows of `window_size` words that share
/// `overlap` words with their predecessor.
///
/// Window `i` of a page starts at word `i * (window_size - overlap)`. A new
/// window is opened only while a full window still fits; the last window of a
/// page absorbs the remaining tail, so it may hold up to
/// `window_size + step - 1` words. A page no longer than `window_size` becomes
/// a single chunk.
///
/// Chunk IDs are `{document_id}_{sequence_index}`, with `sequence_index`
/// counting across all pages of the document.
///
/// # Example
///
/// ```rust
/// use docqa_rag::{Chunker, Document, Page, WordWindowChunker};
///
/// let text = (1..=300).map(|i| format!("word{i}")).collect::<Vec<_>>().join(" ");
/// let doc = Document::new("doc", "doc.pdf", vec![Page::new(1, text)]);
///
/// let chunker = WordWindowChunker::new(100, 20).unwrap();
/// assert_eq!(chunker.chunk(&doc).len(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct WordWindowChunker {
    window_size: usize,
    overlap: usize,
}

impl WordWindowChunker {
    /// Create a new `WordWindowChunker`.
    ///
    /// # Arguments
    ///
    /// * `window_size`: number of words per chunk
    /// * `overlap`: number of words shared by consecutive chunks of a page
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ChunkingConfigError`](crate::RagError::ChunkingConfigError)
    /// unless `0 <= overlap < window_size`.
    pub fn new(window_size: usize, overlap: usize) -> Result<Self> {
        validate_window(window_size, overlap)?;
        Ok(Self { window_size, overlap })
    }

    /// Create a chunker from the window settings of a [`RagConfig`].
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        Self::new(config.window_size, config.overlap)
    }

    /// Words advanced between consecutive window starts. Always at least 1.
    pub fn step_size(&self) -> usize {
        self.window_size - self.overlap
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }
}

/// Half-open word ranges of the windows for a page of `word_count` words.
fn window_bounds(word_count: usize, window_size: usize, step: usize) -> Vec<(usize, usize)> {
    if word_count == 0 {
        return Vec::new();
    }
    if word_count <= window_size {
        return vec![(0, word_count)];
    }

    let mut bounds = Vec::new();
    let mut start = 0;
    loop {
        if start + step + window_size > word_count {
            bounds.push((start, word_count));
            break;
        }
        bounds.push((start, start + window_size));
        start += step;
    }
    bounds
}

impl Chunker for WordWindowChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        let mut pages: Vec<_> = document.pages.iter().collect();
        pages.sort_by_key(|page| page.page_number);

        let mut chunks = Vec::new();
        let mut sequence_index = 0;

        for page in pages {
            let words: Vec<&str> = page.text.split_whitespace().collect();
            if words.is_empty() {
                debug!(document.id = %document.id, page = page.page_number, "skipping empty page");
                continue;
            }

            for (start, end) in window_bounds(words.len(), self.window_size, self.step_size()) {
                chunks.push(Chunk {
                    chunk_id: format!("{}_{sequence_index}", document.id),
                    document_id: document.id.clone(),
                    filename: document.filename.clone(),
                    page_number: page.page_number,
                    text: words[start..end].join(" "),
                    sequence_index,
                });
                sequence_index += 1;
            }
        }

        debug!(document.id = %document.id, chunk_count = chunks.len(), "chunked document");
        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Page;

    fn words(range: std::ops::RangeInclusive<usize>) -> String {
        range.map(|i| format!("word{i}")).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn bounds_for_exact_window() {
        assert_eq!(window_bounds(300, 300, 300), vec![(0, 300)]);
    }

    #[test]
    fn last_window_absorbs_tail() {
        assert_eq!(window_bounds(300, 100, 80), vec![(0, 100), (80, 180), (160, 300)]);
        assert_eq!(window_bounds(260, 100, 80), vec![(0, 100), (80, 180), (160, 260)]);
        assert_eq!(window_bounds(261, 100, 80), vec![(0, 100), (80, 180), (160, 261)]);
    }

    #[test]
    fn single_window_page_is_one_chunk() {
        let doc = Document::new("d", "d.pdf", vec![Page::new(1, words(1..=300))]);
        let chunks = WordWindowChunker::new(300, 0).unwrap().chunk(&doc);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text.split(' ').count(), 300);
    }

    #[test]
    fn overlapping_windows_share_words() {
        let doc = Document::new("d", "d.pdf", vec![Page::new(1, words(1..=300))]);
        let chunks = WordWindowChunker::new(100, 20).unwrap().chunk(&doc);
        assert_eq!(chunks.len(), 3);
        assert_eq!(
            chunks.iter().map(|c| c.sequence_index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert!(chunks[0].text.ends_with("word100"));
        assert!(chunks[1].text.starts_with("word81 "));
        assert!(chunks[2].text.ends_with("word300"));
    }

    #[test]
    fn windows_never_cross_pages() {
        let doc = Document::new(
            "d",
            "d.pdf",
            vec![Page::new(1, words(1..=30)), Page::new(2, words(31..=35))],
        );
        let chunks = WordWindowChunker::new(20, 5).unwrap().chunk(&doc);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[..1].iter().all(|c| c.page_number == 1));
        assert_eq!(chunks[1].page_number, 2);
        assert_eq!(chunks[1].text, words(31..=35));
        assert_eq!(chunks[1].chunk_id, "d_1");
    }

    #[test]
    fn empty_pages_are_skipped() {
        let doc = Document::new(
            "d",
            "d.pdf",
            vec![Page::new(1, "   \n\t "), Page::new(2, "hello world")],
        );
        let chunks = WordWindowChunker::new(10, 2).unwrap().chunk(&doc);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].page_number, 2);
        assert_eq!(chunks[0].sequence_index, 0);
    }

    #[test]
    fn pages_are_emitted_in_page_order() {
        let doc =
            Document::new("d", "d.pdf", vec![Page::new(3, "third"), Page::new(1, "first")]);
        let chunks = WordWindowChunker::new(10, 0).unwrap().chunk(&doc);
        assert_eq!(chunks[0].text, "first");
        assert_eq!(chunks[1].text, "third");
    }

    #[test]
    fn invalid_window_is_rejected_before_chunking() {
        assert!(WordWindowChunker::new(50, 50).is_err());
        assert!(WordWindowChunker::new(50, 80).is_err());
        assert!(WordWindowChunker::new(0, 0).is_err());
    }
}
