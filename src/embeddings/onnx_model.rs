// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! ONNX Embedding Model Wrapper
//!
//! Runs the all-MiniLM-L6-v2 sentence transformer on ONNX Runtime and
//! reproduces its pooling head:
//! - BERT tokenization, truncated to 256 tokens
//! - Mean pooling over token embeddings, weighted by the attention mask
//! - L2 normalization of the pooled vector
//!
//! With the `cuda` feature the session tries the CUDA provider first and
//! falls back to CPU.

use crate::embeddings::EmbeddingModelFiles;
use anyhow::{anyhow, Context, Result};
use ndarray::{Array2, Axis};
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokenizers::{Tokenizer, TruncationParams};
use tracing::{debug, info};

/// Output width of all-MiniLM-L6-v2
pub const MINILM_DIMENSION: usize = 384;

/// Token limit the model was trained with
pub const MAX_SEQUENCE_LENGTH: usize = 256;

/// Texts per ONNX run when embedding many chunks
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// ONNX-based embedding model (all-MiniLM-L6-v2)
///
/// Cloning is cheap; the session and tokenizer are shared.
#[derive(Clone)]
pub struct OnnxEmbeddingModel {
    /// ONNX Runtime session (runs need exclusive access)
    session: Arc<Mutex<Session>>,
    tokenizer: Arc<Tokenizer>,
    model_name: String,
    dimension: usize,
    batch_size: usize,
}

impl std::fmt::Debug for OnnxEmbeddingModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxEmbeddingModel")
            .field("model_name", &self.model_name)
            .field("dimension", &self.dimension)
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

fn build_session(model_path: &Path) -> Result<Session> {
    #[cfg(feature = "cuda")]
    {
        use ort::execution_providers::CUDAExecutionProvider;

        info!("Attempting CUDA execution provider for embeddings");
        let cuda = Session::builder()
            .context("Failed to create session builder")?
            .with_execution_providers([CUDAExecutionProvider::default().build()])
            .context("Failed to set CUDA execution provider")?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .context("Failed to set optimization level")?
            .commit_from_file(model_path);
        match cuda {
            Ok(session) => return Ok(session),
            Err(e) => tracing::warn!("CUDA execution provider failed ({}), using CPU", e),
        }
    }

    Session::builder()
        .context("Failed to create session builder")?
        .with_execution_providers([CPUExecutionProvider::default().build()])
        .context("Failed to set CPU execution provider")?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .context("Failed to set optimization level")?
        .with_intra_threads(4)
        .context("Failed to set intra threads")?
        .commit_from_file(model_path)
        .with_context(|| format!("Failed to load ONNX model from {}", model_path.display()))
}

/// Attention-masked mean of token vectors, then L2 normalised
///
/// `tokens` is `[seq_len][hidden]` flattened row-major.
pub fn mean_pool_normalized(tokens: &[f32], mask: &[i64], hidden: usize) -> Vec<f32> {
    let mut pooled = vec![0.0f32; hidden];
    let mut mask_sum = 0.0f32;

    for (row, &m) in tokens.chunks(hidden).zip(mask.iter()) {
        let weight = m as f32;
        mask_sum += weight;
        for (acc, value) in pooled.iter_mut().zip(row) {
            *acc += value * weight;
        }
    }

    let denom = mask_sum.max(1e-9);
    for value in &mut pooled {
        *value /= denom;
    }

    let norm = pooled.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 1e-12 {
        for value in &mut pooled {
            *value /= norm;
        }
    }
    pooled
}

impl OnnxEmbeddingModel {
    /// Creates a new ONNX embedding model from disk paths
    ///
    /// Runs one validation inference to confirm the graph emits
    /// `[batch, seq_len, 384]` token embeddings.
    ///
    /// # Example
    /// ```ignore
    /// let model = OnnxEmbeddingModel::new(
    ///     "all-MiniLM-L6-v2",
    ///     "./models/all-MiniLM-L6-v2/onnx/model.onnx",
    ///     "./models/all-MiniLM-L6-v2/tokenizer.json",
    /// ).await?;
    /// ```
    pub async fn new<P: AsRef<Path>>(
        model_name: impl Into<String>,
        model_path: P,
        tokenizer_path: P,
    ) -> Result<Self> {
        let model_name = model_name.into();
        let model_path = model_path.as_ref();
        let tokenizer_path = tokenizer_path.as_ref();

        if !model_path.exists() {
            anyhow::bail!("ONNX model file not found: {}", model_path.display());
        }
        if !tokenizer_path.exists() {
            anyhow::bail!("Tokenizer file not found: {}", tokenizer_path.display());
        }

        let session = build_session(model_path)?;

        let mut tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer: {}", e))?;
        tokenizer.with_padding(None);
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_SEQUENCE_LENGTH,
                ..Default::default()
            }))
            .map_err(|e| anyhow!("Failed to configure truncation: {}", e))?;

        let model = Self {
            session: Arc::new(Mutex::new(session)),
            tokenizer: Arc::new(tokenizer),
            model_name,
            dimension: MINILM_DIMENSION,
            batch_size: DEFAULT_BATCH_SIZE,
        };

        let probe = model.run_batch(&["validation test".to_string()])?;
        if probe.first().map(Vec::len) != Some(MINILM_DIMENSION) {
            anyhow::bail!(
                "Model produced {:?}-dimensional embeddings (expected {})",
                probe.first().map(Vec::len),
                MINILM_DIMENSION
            );
        }

        info!(
            "Embedding model {} loaded ({} dimensions)",
            model.model_name, model.dimension
        );
        Ok(model)
    }

    /// Load from the files resolved by [`EmbeddingModelFiles`]
    pub async fn from_files(files: &EmbeddingModelFiles) -> Result<Self> {
        Self::new(files.name.clone(), &files.model_path, &files.tokenizer_path).await
    }

    /// Generates embedding for a single text
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.run_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow!("Embedding model returned no vector"))
    }

    /// Generates embeddings for many texts, `batch_size` at a time
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for (i, batch) in texts.chunks(self.batch_size).enumerate() {
            debug!("Embedding batch {} ({} texts)", i, batch.len());
            embeddings.extend(self.run_batch(batch)?);
        }
        Ok(embeddings)
    }

    /// Tokenize, pad to the longest text, run the graph and pool
    fn run_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let encodings = texts
            .iter()
            .map(|text| {
                self.tokenizer
                    .encode(text.as_str(), true)
                    .map_err(|e| anyhow!("Tokenization failed: {}", e))
            })
            .collect::<Result<Vec<_>>>()?;

        let max_len = encodings
            .iter()
            .map(|enc| enc.get_ids().len())
            .max()
            .unwrap_or(0)
            .max(1);

        let mut input_ids = Vec::with_capacity(texts.len() * max_len);
        let mut attention_mask = Vec::with_capacity(texts.len() * max_len);

        for encoding in &encodings {
            let ids = encoding.get_ids();
            let padding = max_len - ids.len();
            input_ids.extend(ids.iter().map(|&id| id as i64));
            input_ids.extend(std::iter::repeat(0i64).take(padding));
            attention_mask.extend(encoding.get_attention_mask().iter().map(|&m| m as i64));
            attention_mask.extend(std::iter::repeat(0i64).take(padding));
        }
        let token_type_ids = vec![0i64; texts.len() * max_len];
        let mask_for_pooling = attention_mask.clone();

        let shape = (texts.len(), max_len);
        let input_ids_array =
            Array2::from_shape_vec(shape, input_ids).context("Failed to create input_ids array")?;
        let attention_mask_array = Array2::from_shape_vec(shape, attention_mask)
            .context("Failed to create attention_mask array")?;
        let token_type_ids_array = Array2::from_shape_vec(shape, token_type_ids)
            .context("Failed to create token_type_ids array")?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow!("Embedding session lock poisoned"))?;
        let outputs = session.run(ort::inputs![
            "input_ids" => Value::from_array(input_ids_array)?,
            "attention_mask" => Value::from_array(attention_mask_array)?,
            "token_type_ids" => Value::from_array(token_type_ids_array)?
        ])?;

        // Token-level output: [batch, seq_len, hidden]
        let output = outputs[0]
            .try_extract_array::<f32>()
            .context("Failed to extract output tensor")?;
        if output.ndim() != 3 {
            anyhow::bail!(
                "Model outputs unexpected dimensions: {:?} (expected [batch, seq_len, hidden])",
                output.shape()
            );
        }
        let hidden = output.shape()[2];

        let mut embeddings = Vec::with_capacity(texts.len());
        for (idx, item) in output.axis_iter(Axis(0)).enumerate() {
            let tokens: Vec<f32> = item.iter().copied().collect();
            let mask = &mask_for_pooling[idx * max_len..(idx + 1) * max_len];
            embeddings.push(mean_pool_normalized(&tokens, mask, hidden));
        }

        Ok(embeddings)
    }

    /// Counts the tokens the model will see for `text` (after truncation)
    pub fn count_tokens(&self, text: &str) -> Result<usize> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| anyhow!("Tokenization failed: {}", e))?;
        Ok(encoding.get_attention_mask().iter().map(|&m| m as usize).sum())
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }
}
