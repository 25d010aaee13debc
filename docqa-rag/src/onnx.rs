//! Sentence-transformer embedding provider running on ONNX Runtime.
//!
//! Only available with the `onnx` feature. Targets all-MiniLM-L6-v2:
//! - 384 dimensions
//! - mean pooling over the attention mask, then L2 normalisation
//! - inputs truncated to 256 tokens

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use hf_hub::{Repo, RepoType, api::tokio::Api};
use ndarray::{Array2, Axis};
use ort::session::Session;
use ort::session::builder::GraphOptimizationLevel;
use ort::value::Value;
use tokenizers::{Tokenizer, TruncationParams};
use tracing::{debug, error, info};

use crate::embedding::{EmbeddingProvider, normalize};
use crate::error::{RagError, Result};

/// Hugging Face repository of the default model.
pub const DEFAULT_MODEL_REPO: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// Maximum sequence length fed to the model.
const MAX_TOKENS: usize = 256;

/// An [`EmbeddingProvider`] backed by an ONNX sentence-transformer model.
///
/// Load it once at startup with [`from_dir`](Self::from_dir) or
/// [`from_hub`](Self::from_hub) and share it behind an `Arc`. Each text is
/// run through the model as its own unpadded sequence, so a text embeds to
/// the same bits whether it arrives alone or inside a batch.
#[derive(Clone)]
pub struct OnnxEmbeddingProvider {
    session: Arc<Mutex<Session>>,
    tokenizer: Arc<Tokenizer>,
    model_name: String,
    dimensions: usize,
}

impl std::fmt::Debug for OnnxEmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxEmbeddingProvider")
            .field("model_name", &self.model_name)
            .field("dimensions", &self.dimensions)
            .finish_non_exhaustive()
    }
}

fn inference_error(model: &str) -> impl Fn(String) -> RagError + '_ {
    move |message| RagError::EmbeddingError { provider: model.to_string(), message }
}

/// Truncate to [`MAX_TOKENS`] inside the tokenizer, so special tokens such
/// as the trailing `[SEP]` survive, and disable padding.
fn prepare_tokenizer(mut tokenizer: Tokenizer) -> std::result::Result<Tokenizer, String> {
    let truncation = TruncationParams { max_length: MAX_TOKENS, ..Default::default() };
    tokenizer.with_truncation(Some(truncation)).map_err(|e| e.to_string())?;
    tokenizer.with_padding(None);
    Ok(tokenizer)
}

impl OnnxEmbeddingProvider {
    /// Load `model.onnx` and `tokenizer.json` from a local directory.
    pub fn from_dir(model_name: impl Into<String>, dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        Self::from_files(model_name, dir.join("model.onnx"), dir.join("tokenizer.json"))
    }

    /// Resolve the model files through the local Hugging Face cache,
    /// downloading them on first use.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ModelUnavailable`] when the files are neither
    /// cached nor downloadable, or fail to load.
    pub async fn from_hub(repo_id: &str) -> Result<Self> {
        let unavailable = |message: String| RagError::ModelUnavailable {
            model: repo_id.to_string(),
            message,
        };

        info!(model = repo_id, "resolving embedding model");
        let api = Api::new().map_err(|e| unavailable(format!("failed to create HF API: {e}")))?;
        let repo = api.repo(Repo::new(repo_id.to_string(), RepoType::Model));

        debug!("fetching tokenizer");
        let tokenizer_path = repo
            .get("tokenizer.json")
            .await
            .map_err(|e| unavailable(format!("failed to fetch tokenizer: {e}")))?;

        debug!("fetching model weights");
        let model_path = repo
            .get("onnx/model.onnx")
            .await
            .map_err(|e| unavailable(format!("failed to fetch model: {e}")))?;

        let name = repo_id.to_string();
        tokio::task::spawn_blocking(move || Self::from_files(name, model_path, tokenizer_path))
            .await
            .map_err(|e| unavailable(format!("model loading task failed: {e}")))?
    }

    /// Load the model from explicit file paths and measure its output width.
    pub fn from_files(
        model_name: impl Into<String>,
        model_path: PathBuf,
        tokenizer_path: PathBuf,
    ) -> Result<Self> {
        let model_name = model_name.into();
        let unavailable =
            |message: String| RagError::ModelUnavailable { model: model_name.clone(), message };

        if !model_path.exists() {
            return Err(unavailable(format!("model file not found: {}", model_path.display())));
        }
        if !tokenizer_path.exists() {
            return Err(unavailable(format!(
                "tokenizer file not found: {}",
                tokenizer_path.display()
            )));
        }

        let session = Session::builder()
            .and_then(|builder| builder.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|builder| builder.commit_from_file(&model_path))
            .map_err(|e| {
                error!(model = %model_name, error = %e, "failed to create ONNX session");
                unavailable(format!("failed to load {}: {e}", model_path.display()))
            })?;

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| e.to_string())
            .and_then(prepare_tokenizer)
            .map_err(|e| unavailable(format!("failed to load tokenizer: {e}")))?;

        let mut provider = Self {
            session: Arc::new(Mutex::new(session)),
            tokenizer: Arc::new(tokenizer),
            model_name: model_name.clone(),
            dimensions: 0,
        };

        let sample = provider
            .encode_one("dimension check")
            .map_err(|e| unavailable(format!("validation inference failed: {e}")))?;
        provider.dimensions = sample.len();

        info!(model = %model_name, dimensions = provider.dimensions, "embedding model loaded");
        Ok(provider)
    }

    fn encode_one(&self, text: &str) -> Result<Vec<f32>> {
        let fail = inference_error(&self.model_name);

        let encoding =
            self.tokenizer.encode(text, true).map_err(|e| fail(format!("tokenization: {e}")))?;
        let len = encoding.get_ids().len();

        let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        let attention_mask: Vec<i64> =
            encoding.get_attention_mask().iter().map(|&m| m as i64).collect();
        let token_type_ids = vec![0i64; len];
        let mask_for_pooling = attention_mask.clone();

        let input_ids = Array2::from_shape_vec((1, len), input_ids)
            .map_err(|e| fail(format!("input_ids shape: {e}")))?;
        let attention_mask = Array2::from_shape_vec((1, len), attention_mask)
            .map_err(|e| fail(format!("attention_mask shape: {e}")))?;
        let token_type_ids = Array2::from_shape_vec((1, len), token_type_ids)
            .map_err(|e| fail(format!("token_type_ids shape: {e}")))?;

        let input_ids = Value::from_array(input_ids).map_err(|e| fail(e.to_string()))?;
        let attention_mask = Value::from_array(attention_mask).map_err(|e| fail(e.to_string()))?;
        let token_type_ids = Value::from_array(token_type_ids).map_err(|e| fail(e.to_string()))?;

        let mut session =
            self.session.lock().map_err(|_| fail("session lock poisoned".to_string()))?;
        let outputs = session
            .run(ort::inputs![
                "input_ids" => input_ids,
                "attention_mask" => attention_mask,
                "token_type_ids" => token_type_ids
            ])
            .map_err(|e| fail(format!("inference: {e}")))?;

        // [batch, seq_len, hidden]
        let hidden = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e| fail(format!("output tensor: {e}")))?;
        if hidden.ndim() != 3 {
            return Err(fail(format!("unexpected output shape {:?}", hidden.shape())));
        }
        let tokens = hidden.index_axis(Axis(0), 0);
        let (seq_len, hidden_dim) = (tokens.shape()[0], tokens.shape()[1]);

        let mut pooled = vec![0.0f32; hidden_dim];
        let mut mask_sum = 0.0f32;
        for i in 0..seq_len {
            let weight = mask_for_pooling[i] as f32;
            mask_sum += weight;
            for (j, value) in pooled.iter_mut().enumerate() {
                *value += tokens[[i, j]] * weight;
            }
        }
        pooled.iter_mut().for_each(|v| *v /= mask_sum.max(1e-9));
        normalize(&mut pooled);
        Ok(pooled)
    }
}

#[async_trait]
impl EmbeddingProvider for OnnxEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text]).await?;
        vectors.pop().ok_or_else(|| RagError::EmbeddingError {
            provider: self.model_name.clone(),
            message: "no output for input".to_string(),
        })
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(model = %self.model_name, batch_size = texts.len(), "embedding batch");

        let provider = self.clone();
        let texts: Vec<String> = texts.iter().map(|t| t.to_string()).collect();
        tokio::task::spawn_blocking(move || {
            texts.iter().map(|text| provider.encode_one(text)).collect::<Result<Vec<_>>>()
        })
        .await
        .map_err(|e| RagError::EmbeddingError {
            provider: self.model_name.clone(),
            message: format!("inference task failed: {e}"),
        })?
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
