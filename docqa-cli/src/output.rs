//! Human-readable and JSON rendering of command results.

use std::fmt::Write;

use docqa_rag::{IndexStats, SearchHit, SearchOutcome, highlight_keywords};
use serde::Serialize;

const HIGHLIGHT_START: &str = "\x1b[1;33m";
const HIGHLIGHT_END: &str = "\x1b[0m";

/// Format a byte count the way the stats view shows it.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * 1024;
    match bytes {
        b if b < KB => format!("{b} B"),
        b if b < MB => format!("{:.1} KB", b as f64 / KB as f64),
        b => format!("{:.1} MB", b as f64 / MB as f64),
    }
}

#[derive(Serialize)]
struct SearchOutput<'a> {
    query: &'a str,
    indexed: bool,
    results: Vec<SearchHit>,
}

pub fn search_json(query: &str, outcome: &SearchOutcome) -> serde_json::Result<String> {
    let output = SearchOutput {
        query,
        indexed: !outcome.is_no_index(),
        results: outcome.results().iter().map(|r| r.to_hit()).collect(),
    };
    serde_json::to_string_pretty(&output)
}

pub fn search_text(query: &str, outcome: &SearchOutcome, highlight: bool) -> String {
    let results = match outcome {
        SearchOutcome::NoIndex => {
            return "no index built yet; run `docqa index <pages.json>` first\n".to_string();
        }
        SearchOutcome::Results(results) if results.is_empty() => {
            return "no results\n".to_string();
        }
        SearchOutcome::Results(results) => results,
    };

    let mut out = String::new();
    for result in results {
        let text = if highlight {
            highlight_keywords(&result.chunk.text, query, HIGHLIGHT_START, HIGHLIGHT_END)
        } else {
            result.chunk.text.clone()
        };
        let _ = writeln!(out, "{}. {}  score {:.3}", result.rank, result.citation(), result.score);
        let _ = writeln!(out, "   {text}\n");
    }
    out
}

#[derive(Serialize)]
struct StatsOutput<'a> {
    #[serde(flatten)]
    stats: &'a IndexStats,
    index_path: String,
    index_size_bytes: Option<u64>,
}

pub fn stats_json(
    stats: &IndexStats,
    index_path: &str,
    size: Option<u64>,
) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&StatsOutput {
        stats,
        index_path: index_path.to_string(),
        index_size_bytes: size,
    })
}

pub fn stats_text(stats: &IndexStats, index_path: &str, size: Option<u64>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "index:          {index_path}");
    let _ = writeln!(out, "built:          {}", if stats.built { "yes" } else { "no" });
    if let Some(built_at) = stats.built_at {
        let _ = writeln!(out, "built at:       {}", built_at.to_rfc3339());
    }
    let _ = writeln!(out, "documents:      {}", stats.document_count);
    let _ = writeln!(out, "chunks:         {}", stats.chunk_count);
    let _ = writeln!(out, "embedding dim:  {}", stats.embedding_dim);
    let _ = writeln!(out, "index size:     {}", size.map_or_else(|| "-".to_string(), format_size));
    for doc in &stats.documents {
        let _ = writeln!(out, "  {}  {} ({} chunks)", doc.id, doc.filename, doc.chunk_count);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use docqa_rag::{Chunk, IndexedDocument, SearchResult};

    fn result(rank: usize, score: f32) -> SearchResult {
        SearchResult {
            chunk: Chunk {
                chunk_id: "d_0".into(),
                document_id: "d".into(),
                filename: "guide.pdf".into(),
                page_number: 7,
                text: "Refunds are issued within 14 days".into(),
                sequence_index: 0,
            },
            score,
            rank,
        }
    }

    #[test]
    fn sizes() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn no_index_differs_from_no_results() {
        let none = search_text("q", &SearchOutcome::NoIndex, false);
        let empty = search_text("q", &SearchOutcome::Results(Vec::new()), false);
        assert!(none.starts_with("no index built yet"));
        assert_eq!(empty, "no results\n");
    }

    #[test]
    fn results_show_citation_and_score() {
        let outcome = SearchOutcome::Results(vec![result(1, 0.8123)]);
        let text = search_text("refunds", &outcome, false);
        assert!(text.starts_with("1. (guide.pdf, p. 7)  score 0.812"));
    }

    #[test]
    fn highlighting_marks_query_words() {
        let outcome = SearchOutcome::Results(vec![result(1, 0.5)]);
        let text = search_text("refunds", &outcome, true);
        assert!(text.contains(&format!("{HIGHLIGHT_START}Refunds{HIGHLIGHT_END}")));
    }

    #[test]
    fn stats_list_document_ids() {
        let stats = IndexStats {
            document_count: 1,
            chunk_count: 3,
            built: true,
            built_at: None,
            embedding_dim: 384,
            documents: vec![IndexedDocument {
                id: "6466e450a16b".into(),
                filename: "report.pdf".into(),
                chunk_count: 3,
            }],
        };

        let text = stats_text(&stats, "index/docqa.json", Some(2048));
        assert!(text.contains("  6466e450a16b  report.pdf (3 chunks)"));
        assert!(text.contains("index size:     2.0 KB"));

        let value: serde_json::Value =
            serde_json::from_str(&stats_json(&stats, "index/docqa.json", None).unwrap()).unwrap();
        assert_eq!(value["documents"][0]["id"], "6466e450a16b");
        assert_eq!(value["chunk_count"], 3);
    }

    #[test]
    fn json_output_uses_flat_hits() {
        let outcome = SearchOutcome::Results(vec![result(1, 0.5)]);
        let value: serde_json::Value =
            serde_json::from_str(&search_json("refunds", &outcome).unwrap()).unwrap();
        assert_eq!(value["indexed"], true);
        assert_eq!(value["results"][0]["document"], "guide.pdf");
        assert_eq!(value["results"][0]["page"], 7);
        assert_eq!(value["results"][0]["rank"], 1);
    }
}
