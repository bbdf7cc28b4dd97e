// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Embedding model artifacts from the Hugging Face Hub
//!
//! The ONNX export and tokenizer of a sentence-transformers repository are
//! fetched through the hub cache (`~/.cache/huggingface/hub` unless
//! `HF_HOME` says otherwise), so they download once and are reused.

use anyhow::{Context, Result};
use hf_hub::api::tokio::ApiBuilder;
use std::path::PathBuf;
use tracing::info;

/// ONNX graph inside a sentence-transformers repository
pub const ONNX_MODEL_FILE: &str = "onnx/model.onnx";
pub const TOKENIZER_FILE: &str = "tokenizer.json";

/// Local paths of the files the embedding model needs
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingModelFiles {
    /// Short model name (last path segment of the repo id)
    pub name: String,
    pub model_path: PathBuf,
    pub tokenizer_path: PathBuf,
}

impl EmbeddingModelFiles {
    /// Use files that are already on disk
    pub fn local(name: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            name: name.into(),
            model_path: dir.join(ONNX_MODEL_FILE),
            tokenizer_path: dir.join(TOKENIZER_FILE),
        }
    }

    /// Resolve the files for `repo_id`, downloading whatever is not cached yet
    pub async fn fetch(repo_id: &str) -> Result<Self> {
        info!("Resolving embedding model {} from the hub cache", repo_id);

        let api = ApiBuilder::new()
            .with_progress(true)
            .build()
            .context("Failed to initialise Hugging Face Hub client")?;
        let repo = api.model(repo_id.to_string());

        let model_path = repo
            .get(ONNX_MODEL_FILE)
            .await
            .with_context(|| format!("Failed to fetch {} from {}", ONNX_MODEL_FILE, repo_id))?;
        let tokenizer_path = repo
            .get(TOKENIZER_FILE)
            .await
            .with_context(|| format!("Failed to fetch {} from {}", TOKENIZER_FILE, repo_id))?;

        Ok(Self {
            name: short_name(repo_id),
            model_path,
            tokenizer_path,
        })
    }
}

fn short_name(repo_id: &str) -> String {
    repo_id.rsplit('/').next().unwrap_or(repo_id).to_string()
}
