//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "docqa")]
#[command(about = "Index extracted PDF text and search it with cited passages")]
#[command(version)]
pub struct Cli {
    /// Index file to load and persist
    #[arg(long, global = true, env = "DOCQA_INDEX", default_value = "index/docqa.json")]
    pub index: PathBuf,

    /// TOML config file with a [retrieval] table
    #[arg(short, long, global = true, env = "DOCQA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Embedding backend
    #[arg(long, global = true, env = "DOCQA_EMBEDDER", default_value = "hashing")]
    pub embedder: EmbedderKind,

    /// Directory holding model.onnx and tokenizer.json (onnx backend)
    #[arg(long, global = true, env = "DOCQA_MODEL_DIR")]
    pub model_dir: Option<PathBuf>,

    #[command(flatten)]
    pub retrieval: RetrievalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum EmbedderKind {
    /// Offline lexical feature hashing
    #[default]
    Hashing,
    /// all-MiniLM-L6-v2 sentence transformer (requires the `onnx` feature)
    Onnx,
}

/// Overrides for the `[retrieval]` config table.
#[derive(clap::Args, Debug, Default, Clone)]
pub struct RetrievalArgs {
    /// Passage length in words
    #[arg(long, global = true, env = "DOCQA_WINDOW_SIZE")]
    pub window_size: Option<usize>,

    /// Words shared by consecutive passages
    #[arg(long, global = true, env = "DOCQA_OVERLAP")]
    pub overlap: Option<usize>,

    /// Texts per embedding batch
    #[arg(long, global = true, env = "DOCQA_EMBED_BATCH_SIZE")]
    pub embed_batch_size: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Rebuild the index from scratch
    Index {
        /// JSON files of extracted pages
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },

    /// Add documents, replacing earlier versions with the same id
    Add {
        /// JSON files of extracted pages
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },

    /// Remove a document from the index
    Remove {
        /// Document id or filename as listed by `stats`
        document: String,
    },

    /// Search the index
    Search {
        /// Free-text query
        query: String,

        /// Maximum number of results
        #[arg(short, long)]
        k: Option<usize>,

        /// Drop results scoring below this value
        #[arg(long)]
        min_score: Option<f32>,

        /// Mark query words in the passage text
        #[arg(long)]
        highlight: bool,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show index statistics
    Stats {
        /// Print statistics as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete the index (source files are left alone)
    Clear,
}
