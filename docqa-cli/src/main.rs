//! # docqa
//!
//! Command-line front end for `docqa-rag`: index extracted PDF page text,
//! then ask questions and get ranked passages with page citations.
//!
//! ```bash
//! docqa index handbook.json manual.json
//! docqa search "how many vacation days do I get" -k 3 --highlight
//! docqa stats
//! ```
//!
//! Logs go to stderr and are filtered with `RUST_LOG` (default `info`).

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use docqa_rag::{EmbeddingProvider, HashingEmbeddingProvider, KnowledgeBase, RagConfig};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod input;
mod output;

use cli::{Cli, Commands, EmbedderKind};

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder =
        tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.with_target(false).init();
    }
}

/// Load the embedding model once; it is shared by indexing and search.
async fn load_provider(cli: &Cli) -> Result<Arc<dyn EmbeddingProvider>> {
    match cli.embedder {
        EmbedderKind::Hashing => {
            if cli.model_dir.is_some() {
                bail!("--model-dir only applies to the onnx embedder");
            }
            Ok(Arc::new(HashingEmbeddingProvider::new()))
        }
        EmbedderKind::Onnx => load_onnx(cli.model_dir.as_deref()).await,
    }
}

#[cfg(feature = "onnx")]
async fn load_onnx(model_dir: Option<&Path>) -> Result<Arc<dyn EmbeddingProvider>> {
    use docqa_rag::onnx::{DEFAULT_MODEL_REPO, OnnxEmbeddingProvider};

    let provider = match model_dir {
        Some(dir) => OnnxEmbeddingProvider::from_dir(DEFAULT_MODEL_REPO, dir)?,
        None => OnnxEmbeddingProvider::from_hub(DEFAULT_MODEL_REPO).await?,
    };
    Ok(Arc::new(provider))
}

#[cfg(not(feature = "onnx"))]
async fn load_onnx(_model_dir: Option<&Path>) -> Result<Arc<dyn EmbeddingProvider>> {
    bail!("docqa was built without the `onnx` feature; rebuild with `--features onnx`")
}

fn knowledge_base(
    cli: &Cli,
    config: RagConfig,
    provider: Arc<dyn EmbeddingProvider>,
) -> Result<KnowledgeBase> {
    KnowledgeBase::builder()
        .config(config)
        .embedding_provider(provider)
        .index_path(&cli.index)
        .build()
        .context("failed to set up knowledge base")
}

async fn open(kb: &KnowledgeBase, index: &Path) -> Result<()> {
    let loaded = kb.open().await.with_context(|| {
        format!(
            "cannot use index {}; rebuild it with `docqa index` or delete it with `docqa clear`",
            index.display()
        )
    })?;
    debug!(loaded, "opened knowledge base");
    Ok(())
}

async fn index_size(path: &Path) -> Option<u64> {
    tokio::fs::metadata(path).await.ok().map(|m| m.len())
}

async fn run(cli: Cli) -> Result<()> {
    let config = config::load(cli.config.as_deref(), &cli.retrieval)?;
    let index_path = cli.index.display().to_string();

    // Clearing never needs the model.
    let provider: Arc<dyn EmbeddingProvider> = match cli.command {
        Commands::Clear => Arc::new(HashingEmbeddingProvider::new()),
        _ => load_provider(&cli).await?,
    };
    info!(model = provider.model_name(), dimensions = provider.dimensions(), "model ready");
    let kb = knowledge_base(&cli, config, provider)?;

    match &cli.command {
        Commands::Index { inputs } => {
            let documents = input::read_documents(inputs).await?;
            let stats = kb.build_index(&documents).await?;
            println!(
                "indexed {} chunks from {} documents into {index_path}",
                stats.chunk_count, stats.document_count
            );
        }
        Commands::Add { inputs } => {
            open(&kb, &cli.index).await?;
            let documents = input::read_documents(inputs).await?;
            let stats = kb.add_documents(&documents).await?;
            println!(
                "added {} documents; index now holds {} chunks from {} documents",
                documents.len(),
                stats.chunk_count,
                stats.document_count
            );
        }
        Commands::Remove { document } => {
            open(&kb, &cli.index).await?;
            let document_id = kb.resolve_document(document).await?;
            let stats = kb.remove_document(&document_id).await?;
            println!(
                "removed {document} ({document_id}); index now holds {} chunks from {} documents",
                stats.chunk_count, stats.document_count
            );
        }
        Commands::Search { query, k, min_score, highlight, json } => {
            open(&kb, &cli.index).await?;
            let k = k.unwrap_or(kb.config().top_k);
            let min_score = min_score.unwrap_or(kb.config().min_score);
            let outcome = kb.query(query, k, min_score).await?;
            if *json {
                println!("{}", output::search_json(query, &outcome)?);
            } else {
                print!("{}", output::search_text(query, &outcome, *highlight));
            }
        }
        Commands::Stats { json } => {
            open(&kb, &cli.index).await?;
            let stats = kb.stats().await;
            let size = index_size(&cli.index).await;
            if *json {
                println!("{}", output::stats_json(&stats, &index_path, size)?);
            } else {
                print!("{}", output::stats_text(&stats, &index_path, size));
            }
        }
        Commands::Clear => {
            kb.reset().await?;
            println!("cleared index {index_path}");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);
    run(cli).await
}
