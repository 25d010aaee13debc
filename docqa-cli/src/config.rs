//! Configuration file loading.
//!
//! The file is optional. Only the `[retrieval]` table is read; missing keys
//! fall back to [`RagConfig::default`].
//!
//! ```toml
//! [retrieval]
//! window_size = 300
//! overlap = 50
//! top_k = 5
//! min_score = 0.0
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use docqa_rag::RagConfig;
use serde::Deserialize;

use crate::cli::RetrievalArgs;

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    retrieval: RagConfig,
}

/// Parse the `[retrieval]` table of a TOML document.
pub fn parse(text: &str) -> Result<RagConfig> {
    let file: ConfigFile = toml::from_str(text).context("invalid config file")?;
    Ok(file.retrieval)
}

/// Load the config file (if any), apply command-line overrides and validate
/// the result once.
pub fn load(path: Option<&Path>, overrides: &RetrievalArgs) -> Result<RagConfig> {
    let mut config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            parse(&text).with_context(|| format!("in {}", path.display()))?
        }
        None => RagConfig::default(),
    };

    if let Some(window_size) = overrides.window_size {
        config.window_size = window_size;
    }
    if let Some(overlap) = overrides.overlap {
        config.overlap = overlap;
    }
    if let Some(batch) = overrides.embed_batch_size {
        config.embed_batch_size = batch;
    }

    config.validate().context("invalid retrieval settings")?;
    Ok(config)
}
