//! Reading extracted page text.
//!
//! PDF text extraction happens upstream; the CLI consumes its output as JSON,
//! either a single document or an array of documents:
//!
//! ```json
//! { "filename": "handbook.pdf", "pages": [{ "page_number": 1, "text": "..." }] }
//! ```
//!
//! `id` is optional and defaults to a hash of the filename.

use std::path::PathBuf;

use anyhow::{Context, Result};
use docqa_rag::{Document, Page};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct DocumentInput {
    id: Option<String>,
    filename: String,
    #[serde(default)]
    pages: Vec<Page>,
}

impl From<DocumentInput> for Document {
    fn from(input: DocumentInput) -> Self {
        match input.id {
            Some(id) => Document::new(id, input.filename, input.pages),
            None => Document::from_filename(input.filename, input.pages),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InputFile {
    Many(Vec<DocumentInput>),
    One(DocumentInput),
}

/// Parse one JSON input into documents.
pub fn parse(text: &str) -> Result<Vec<Document>> {
    let parsed: InputFile = serde_json::from_str(text)?;
    let inputs = match parsed {
        InputFile::Many(inputs) => inputs,
        InputFile::One(input) => vec![input],
    };
    Ok(inputs.into_iter().map(Document::from).collect())
}

/// Read every input file, in order.
pub async fn read_documents(paths: &[PathBuf]) -> Result<Vec<Document>> {
    let mut documents = Vec::new();
    for path in paths {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        let parsed =
            parse(&text).with_context(|| format!("{} is not a page-text file", path.display()))?;
        documents.extend(parsed);
    }
    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_document_without_id_uses_filename_hash() {
        let docs = parse(r#"{"filename": "a.pdf", "pages": [{"page_number": 2, "text": "hi"}]}"#)
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, docqa_rag::document_id_for("a.pdf"));
        assert_eq!(docs[0].pages[0].page_number, 2);
    }

    #[test]
    fn array_with_explicit_ids() {
        let docs = parse(
            r#"[{"id": "x", "filename": "a.pdf", "pages": []},
                {"id": "y", "filename": "b.pdf"}]"#,
        )
        .unwrap();
        assert_eq!(docs.iter().map(|d| d.id.as_str()).collect::<Vec<_>>(), vec!["x", "y"]);
        assert!(docs[1].pages.is_empty());
    }

    #[test]
    fn missing_filename_is_rejected() {
        assert!(parse(r#"{"pages": []}"#).is_err());
    }
}
