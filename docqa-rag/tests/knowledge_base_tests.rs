//! End-to-end tests: chunk, embed, index, query and persist through the
//! knowledge base using the offline hashing embedder.

use std::sync::Arc;

use async_trait::async_trait;
use docqa_rag::{
    Document, EmbeddingProvider, HashingEmbeddingProvider, InMemoryVectorIndex, KnowledgeBase,
    Page, RagConfig, RagError, Result, SearchOutcome, VectorIndex,
};

fn config() -> RagConfig {
    RagConfig::builder().window_size(12).overlap(2).top_k(5).build().unwrap()
}

fn knowledge_base() -> KnowledgeBase {
    KnowledgeBase::builder()
        .config(config())
        .embedding_provider(Arc::new(HashingEmbeddingProvider::new()))
        .build()
        .unwrap()
}

fn handbook() -> Document {
    Document::from_filename(
        "handbook.pdf",
        vec![
            Page::new(1, "Employees accrue twenty vacation days per calendar year"),
            Page::new(2, "Expense reports must be filed within thirty days of travel"),
        ],
    )
}

fn manual() -> Document {
    Document::from_filename(
        "manual.pdf",
        vec![
            Page::new(1, "Press the reset button for five seconds to restore factory settings"),
            Page::new(4, "The warranty covers manufacturing defects for two years"),
        ],
    )
}

/// One ten-word page per topic, with vocabulary unique to the topic.
fn catalogue(topics: usize) -> Document {
    let pages = (0..topics)
        .map(|t| {
            let text = (0..10).map(|w| format!("topic{t}term{w}")).collect::<Vec<_>>().join(" ");
            Page::new(t as u32 + 1, text)
        })
        .collect();
    Document::from_filename("catalogue.pdf", pages)
}

#[tokio::test]
async fn query_before_any_build_reports_no_index() {
    let kb = knowledge_base();
    assert_eq!(kb.search("anything").await.unwrap(), SearchOutcome::NoIndex);
    assert!(!kb.stats().await.built);
}

#[tokio::test]
async fn exact_passage_ranks_first_with_its_citation() {
    let kb = knowledge_base();
    let stats = kb.build_index(&[handbook(), manual()]).await.unwrap();
    assert_eq!(stats.document_count, 2);
    assert_eq!(stats.chunk_count, 4);
    assert_eq!(stats.filenames(), vec!["handbook.pdf", "manual.pdf"]);

    let outcome = kb
        .search("The warranty covers manufacturing defects for two years")
        .await
        .unwrap();
    let top = &outcome.results()[0];

    assert_eq!(top.rank, 1);
    assert!(top.score > 0.9, "score was {}", top.score);
    assert_eq!(top.chunk.filename, "manual.pdf");
    assert_eq!(top.chunk.page_number, 4);
    assert_eq!(top.citation().to_string(), "(manual.pdf, p. 4)");
}

#[tokio::test]
async fn results_are_bounded_ranked_and_non_increasing() {
    let kb = knowledge_base();
    let stats = kb.build_index(&[catalogue(100)]).await.unwrap();
    assert_eq!(stats.chunk_count, 100);

    let query = "topic42term0 topic42term1 topic42term2 topic42term3";
    let results = kb.query(query, 5, -1.0).await.unwrap().into_results();
    assert_eq!(results.len(), 5);

    let ranks: Vec<usize> = results.iter().map(|r| r.rank).collect();
    assert_eq!(ranks, vec![1, 2, 3, 4, 5]);
    for pair in results.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
    assert_eq!(results[0].chunk.page_number, 43);
}

#[tokio::test]
async fn min_score_filters_to_an_empty_result_list() {
    let kb = knowledge_base();
    kb.build_index(&[handbook()]).await.unwrap();

    let outcome = kb.query("completely unrelated vocabulary", 5, 0.99).await.unwrap();
    assert_eq!(outcome, SearchOutcome::Results(Vec::new()));
}

#[tokio::test]
async fn blank_query_returns_no_results() {
    let kb = knowledge_base();
    kb.build_index(&[handbook()]).await.unwrap();
    assert!(kb.search("   ").await.unwrap().results().is_empty());
}

#[tokio::test]
async fn zero_k_is_a_config_error() {
    let kb = knowledge_base();
    kb.build_index(&[handbook()]).await.unwrap();
    assert!(matches!(kb.query("vacation", 0, 0.0).await, Err(RagError::ConfigError(_))));
}

#[tokio::test]
async fn documents_without_text_build_an_empty_index() {
    let kb = knowledge_base();
    let scanned = Document::from_filename("scan.pdf", vec![Page::new(1, ""), Page::new(2, " ")]);

    let stats = kb.build_index(&[scanned]).await.unwrap();
    assert!(stats.built);
    assert_eq!(stats.chunk_count, 0);
    assert!(kb.search("anything").await.unwrap().is_no_index());
}

#[tokio::test]
async fn rebuild_replaces_previous_document_set() {
    let kb = knowledge_base();
    kb.build_index(&[handbook(), manual()]).await.unwrap();
    let stats = kb.build_index(&[manual()]).await.unwrap();

    assert_eq!(stats.filenames(), vec!["manual.pdf"]);
    let results = kb.query("vacation days", 10, -1.0).await.unwrap().into_results();
    assert!(results.iter().all(|r| r.chunk.filename == "manual.pdf"));
}

#[tokio::test]
async fn add_replaces_same_document_and_remove_drops_it() {
    let kb = knowledge_base();
    kb.build_index(&[handbook()]).await.unwrap();

    let stats = kb.add_documents(&[manual()]).await.unwrap();
    assert_eq!(stats.document_count, 2);

    let revised = Document::from_filename(
        "handbook.pdf",
        vec![Page::new(1, "Employees accrue twenty five vacation days per year")],
    );
    let stats = kb.add_documents(&[revised.clone()]).await.unwrap();
    assert_eq!(stats.document_count, 2);
    assert_eq!(stats.chunk_count, 3);

    let stats = kb.remove_document(&revised.id).await.unwrap();
    assert_eq!(stats.filenames(), vec!["manual.pdf"]);
    assert!(matches!(
        kb.remove_document(&revised.id).await,
        Err(RagError::PipelineError(_))
    ));
}

#[tokio::test]
async fn persisted_index_reopens_with_identical_results() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("index").join("docqa.json");
    let query = "how long is the warranty";

    let first = KnowledgeBase::builder()
        .config(config())
        .embedding_provider(Arc::new(HashingEmbeddingProvider::new()))
        .index_path(&path)
        .build()
        .unwrap();
    assert!(!first.open().await.unwrap());
    first.build_index(&[handbook(), manual()]).await.unwrap();
    let before = first.search(query).await.unwrap();

    let second = KnowledgeBase::builder()
        .config(config())
        .embedding_provider(Arc::new(HashingEmbeddingProvider::new()))
        .index_path(&path)
        .build()
        .unwrap();
    assert!(second.open().await.unwrap());

    assert_eq!(second.search(query).await.unwrap(), before);
    assert_eq!(second.stats().await.built_at, first.stats().await.built_at);
}

#[tokio::test]
async fn reset_clears_index_and_deletes_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("docqa.json");

    let kb = KnowledgeBase::builder()
        .config(config())
        .embedding_provider(Arc::new(HashingEmbeddingProvider::new()))
        .index_path(&path)
        .build()
        .unwrap();
    kb.build_index(&[handbook()]).await.unwrap();
    assert!(path.exists());

    kb.reset().await.unwrap();
    assert!(!path.exists());
    assert!(kb.search("vacation").await.unwrap().is_no_index());

    // Resetting twice is fine.
    kb.reset().await.unwrap();
}

/// Fails on any text containing "poison".
struct FlakyProvider {
    inner: HashingEmbeddingProvider,
}

#[async_trait]
impl EmbeddingProvider for FlakyProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.contains("poison") {
            return Err(RagError::EmbeddingError {
                provider: "flaky".to_string(),
                message: "model crashed".to_string(),
            });
        }
        self.inner.embed(text).await
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn model_name(&self) -> &str {
        "flaky"
    }
}

#[tokio::test]
async fn failed_embedding_commits_nothing() {
    let kb = KnowledgeBase::builder()
        .config(config())
        .embedding_provider(Arc::new(FlakyProvider { inner: HashingEmbeddingProvider::new() }))
        .build()
        .unwrap();
    kb.build_index(&[handbook()]).await.unwrap();
    let before = kb.stats().await;

    let poisoned = Document::from_filename("bad.pdf", vec![Page::new(1, "a poison pill")]);
    let err = kb.build_index(&[manual(), poisoned]).await;

    assert!(matches!(err, Err(RagError::EmbeddingError { .. })));
    assert_eq!(kb.stats().await, before);
}

#[test]
fn index_and_model_dimensions_must_agree() {
    let err = KnowledgeBase::builder()
        .config(config())
        .embedding_provider(Arc::new(HashingEmbeddingProvider::new()))
        .vector_index(Arc::new(InMemoryVectorIndex::new(8)))
        .build();
    assert!(matches!(err, Err(RagError::DimensionMismatch { expected: 8, actual: 384 })));
}

#[test]
fn invalid_window_is_rejected_at_build_time() {
    let config = RagConfig { window_size: 10, overlap: 10, ..RagConfig::default() };
    let err = KnowledgeBase::builder()
        .config(config)
        .embedding_provider(Arc::new(HashingEmbeddingProvider::new()))
        .build();
    assert!(matches!(err, Err(RagError::ChunkingConfigError(_))));
}

#[tokio::test]
async fn documents_sharing_an_id_keep_only_the_last_version() {
    let kb = knowledge_base();
    let draft = Document::from_filename("report.pdf", vec![Page::new(1, "draft figures")]);
    let fin = Document::from_filename("report.pdf", vec![Page::new(1, "final audited figures")]);

    let stats = kb.build_index(&[draft.clone(), fin.clone()]).await.unwrap();
    assert_eq!(stats.document_count, 1);
    assert_eq!(stats.chunk_count, 1);

    let results = kb.query("figures", 10, -1.0).await.unwrap().into_results();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].chunk.text, "final audited figures");

    let stats = kb.add_documents(&[fin, draft]).await.unwrap();
    assert_eq!(stats.chunk_count, 1);
    let chunk_ids: Vec<String> =
        kb.index().entries().await.into_iter().map(|e| e.chunk.chunk_id).collect();
    assert_eq!(chunk_ids.len(), 1);

    let results = kb.query("figures", 10, -1.0).await.unwrap().into_results();
    assert_eq!(results[0].chunk.text, "draft figures");
}

#[tokio::test]
async fn stats_list_ids_that_remove_accepts() {
    let kb = knowledge_base();
    kb.build_index(&[handbook(), manual()]).await.unwrap();

    let stats = kb.stats().await;
    let listed = &stats.documents[1];
    assert_eq!(listed.filename, "manual.pdf");
    assert_eq!(listed.id, manual().id);
    assert_eq!(listed.chunk_count, 2);

    assert_eq!(kb.resolve_document("manual.pdf").await.unwrap(), manual().id);
    assert_eq!(kb.resolve_document(&listed.id).await.unwrap(), manual().id);

    let id = kb.resolve_document("handbook.pdf").await.unwrap();
    let stats = kb.remove_document(&id).await.unwrap();
    assert_eq!(stats.filenames(), vec!["manual.pdf"]);
    assert!(matches!(
        kb.resolve_document("handbook.pdf").await,
        Err(RagError::PipelineError(_))
    ));
}

#[tokio::test]
async fn filename_shared_by_two_ids_must_be_removed_by_id() {
    let kb = knowledge_base();
    let a = Document::new("a", "scan.pdf", vec![Page::new(1, "first copy")]);
    let b = Document::new("b", "scan.pdf", vec![Page::new(1, "second copy")]);
    kb.build_index(&[a, b]).await.unwrap();

    assert!(matches!(kb.resolve_document("scan.pdf").await, Err(RagError::PipelineError(_))));
    assert_eq!(kb.resolve_document("b").await.unwrap(), "b");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stats_never_mix_index_generations() {
    let kb = Arc::new(knowledge_base());
    let small = vec![handbook()];
    let large = vec![handbook(), manual(), catalogue(6)];
    kb.build_index(&small).await.unwrap();

    let reader = {
        let kb = Arc::clone(&kb);
        tokio::spawn(async move {
            for _ in 0..200 {
                let stats = kb.stats().await;
                let listed: usize = stats.documents.iter().map(|d| d.chunk_count).sum();
                assert_eq!(listed, stats.chunk_count);
                assert_eq!(stats.documents.len(), stats.document_count);
                match stats.document_count {
                    1 => assert_eq!(stats.chunk_count, 2),
                    3 => assert_eq!(stats.chunk_count, 10),
                    other => panic!("unexpected document count {other}"),
                }
                tokio::task::yield_now().await;
            }
        })
    };

    for i in 0..20 {
        let docs = if i % 2 == 0 { &large } else { &small };
        kb.build_index(docs).await.unwrap();
    }
    reader.await.unwrap();
}

#[tokio::test]
async fn reset_keeps_index_when_file_cannot_be_deleted() {
    let dir = tempfile::tempdir().unwrap();
    // A directory where the index file should be: saving and deleting both fail.
    let path = dir.path().join("docqa.json");
    std::fs::create_dir(&path).unwrap();

    let kb = KnowledgeBase::builder()
        .config(config())
        .embedding_provider(Arc::new(HashingEmbeddingProvider::new()))
        .index_path(&path)
        .build()
        .unwrap();
    assert!(kb.build_index(&[handbook()]).await.is_err());
    assert_eq!(kb.stats().await.chunk_count, 2);

    assert!(kb.reset().await.is_err());
    assert_eq!(kb.stats().await.chunk_count, 2);
    assert!(!kb.search("vacation").await.unwrap().is_no_index());
}
