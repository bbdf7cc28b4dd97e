// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Sentence embeddings for chunks and questions
//!
//! [`Embedder`] is the seam between the vector store and the model that
//! turns text into vectors. The production implementation is
//! [`OnnxEmbeddingModel`] (all-MiniLM-L6-v2 on ONNX Runtime).

pub mod model_files;
pub mod onnx_model;

pub use model_files::EmbeddingModelFiles;
pub use onnx_model::OnnxEmbeddingModel;

use anyhow::Result;
use async_trait::async_trait;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text (used for questions)
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed many texts, preserving order (used for chunks)
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Length of every vector this embedder produces
    fn dimension(&self) -> usize;
}

#[async_trait]
impl Embedder for OnnxEmbeddingModel {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        OnnxEmbeddingModel::embed(self, text).await
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        OnnxEmbeddingModel::embed_batch(self, texts).await
    }

    fn dimension(&self) -> usize {
        OnnxEmbeddingModel::dimension(self)
    }
}
