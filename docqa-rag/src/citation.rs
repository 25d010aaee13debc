//! Citation formatting and query keyword highlighting for retrieved passages.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where a passage came from: one file, one page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Citation {
    pub filename: String,
    pub page: u32,
}

impl fmt::Display for Citation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, p. {})", self.filename, self.page)
    }
}

/// Characters stripped from both ends of a word before comparing it.
const PUNCTUATION: &[char] = &['.', ',', '!', '?', ';', ':', '"', '\'', '(', ')', '[', ']'];

/// Wrap every word of `text` that matches a query word in `start`/`end` markers.
///
/// Matching is case-insensitive on the punctuation-trimmed word. Query words
/// of two characters or fewer are ignored. The output re-joins words with
/// single spaces, so original line breaks are not preserved.
///
/// ```rust
/// use docqa_rag::highlight_keywords;
///
/// let out = highlight_keywords("Rust is fast.", "fast rust", "**", "**");
/// assert_eq!(out, "**Rust** is **fast.**");
/// ```
pub fn highlight_keywords(text: &str, query: &str, start: &str, end: &str) -> String {
    let query_words: Vec<String> =
        query.split_whitespace().filter(|w| w.chars().count() > 2).map(str::to_lowercase).collect();

    if query_words.is_empty() {
        return text.to_string();
    }

    text.split_whitespace()
        .map(|word| {
            let bare = word.to_lowercase();
            let bare = bare.trim_matches(PUNCTUATION);
            if query_words.iter().any(|q| q == bare) {
                format!("{start}{word}{end}")
            } else {
                word.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn citation_display() {
        let c = Citation { filename: "manual.pdf".into(), page: 12 };
        assert_eq!(c.to_string(), "(manual.pdf, p. 12)");
    }

    #[test]
    fn short_query_words_are_ignored() {
        let out = highlight_keywords("an ox is here", "an ox", "<", ">");
        assert_eq!(out, "an ox is here");
    }

    #[test]
    fn matching_is_case_insensitive_and_ignores_punctuation() {
        let out = highlight_keywords("(Vector) search, VECTOR!", "vector", "[", "]");
        assert_eq!(out, "[(Vector)] search, [VECTOR!]");
    }
}
