//! On-disk index format.
//!
//! A single JSON document holding a format version, the vector dimensionality,
//! the embedding model name, the build time, the vectors and a parallel array
//! of chunk metadata records.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::document::Chunk;
use crate::error::{RagError, Result};
use crate::vectorstore::IndexEntry;

/// Version written by this crate and the only one it reads.
pub const FORMAT_VERSION: u32 = 1;

/// Serialized form of a vector index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistedIndex {
    pub format_version: u32,
    pub dimensions: usize,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub built_at: Option<DateTime<Utc>>,
    pub vectors: Vec<Vec<f32>>,
    pub metadata: Vec<Chunk>,
}

#[derive(Deserialize)]
struct VersionHeader {
    format_version: u32,
}

impl PersistedIndex {
    /// Split entries into the parallel vector/metadata arrays.
    pub fn from_entries(
        dimensions: usize,
        model: Option<String>,
        built_at: Option<DateTime<Utc>>,
        entries: &[IndexEntry],
    ) -> Self {
        let (vectors, metadata): (Vec<_>, Vec<_>) =
            entries.iter().map(|e| (e.vector.clone(), e.chunk.clone())).unzip();
        Self { format_version: FORMAT_VERSION, dimensions, model, built_at, vectors, metadata }
    }

    /// Check the container against an index of `dimensions` and zip it back
    /// into entries.
    pub fn into_entries(self, dimensions: usize) -> Result<Vec<IndexEntry>> {
        if self.dimensions != dimensions {
            return Err(RagError::IncompatibleIndex(format!(
                "index was written for {}-dimensional vectors, expected {dimensions}",
                self.dimensions
            )));
        }
        if self.vectors.len() != self.metadata.len() {
            return Err(RagError::IncompatibleIndex(format!(
                "{} vectors but {} metadata records",
                self.vectors.len(),
                self.metadata.len()
            )));
        }
        if let Some((position, vector)) =
            self.vectors.iter().enumerate().find(|(_, v)| v.len() != dimensions)
        {
            return Err(RagError::IncompatibleIndex(format!(
                "vector {position} has {} dimensions, expected {dimensions}",
                vector.len()
            )));
        }

        Ok(self
            .vectors
            .into_iter()
            .zip(self.metadata)
            .map(|(vector, chunk)| IndexEntry { vector, chunk })
            .collect())
    }

    /// Write to `path` through a temporary sibling file, replacing any
    /// previous file only once the new one is complete.
    pub async fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let data = serde_json::to_vec(self).map_err(|e| {
            error!(path = %path.display(), error = %e, "failed to serialize index");
            RagError::PipelineError(format!("failed to serialize index: {e}"))
        })?;

        let tmp = temp_path(path);
        tokio::fs::write(&tmp, &data).await?;
        tokio::fs::rename(&tmp, path).await?;
        debug!(path = %path.display(), bytes = data.len(), "wrote index file");
        Ok(())
    }

    /// Read and parse the file at `path`.
    ///
    /// Missing files surface as [`RagError::Io`]; anything that is not a
    /// readable index of [`FORMAT_VERSION`] is [`RagError::IncompatibleIndex`].
    pub async fn read(path: &Path) -> Result<Self> {
        let data = tokio::fs::read(path).await?;
        Self::from_slice(&data)
    }

    fn from_slice(data: &[u8]) -> Result<Self> {
        let header: VersionHeader = serde_json::from_slice(data).map_err(|e| {
            RagError::IncompatibleIndex(format!("index file is not readable: {e}"))
        })?;
        if header.format_version != FORMAT_VERSION {
            return Err(RagError::IncompatibleIndex(format!(
                "unsupported index format version {} (expected {FORMAT_VERSION})",
                header.format_version
            )));
        }
        serde_json::from_slice(data)
            .map_err(|e| RagError::IncompatibleIndex(format!("index file is malformed: {e}")))
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
