// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! ONNX embedding model tests
//!
//! These load all-MiniLM-L6-v2 through the Hugging Face Hub cache, so they
//! need network access on first run and are ignored by default.

use local_rag_chat::config::DEFAULT_EMBEDDING_REPO;
use local_rag_chat::embeddings::{Embedder, EmbeddingModelFiles, OnnxEmbeddingModel};

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod onnx_model_tests {
    use super::*;

    async fn load() -> OnnxEmbeddingModel {
        let files = EmbeddingModelFiles::fetch(DEFAULT_EMBEDDING_REPO)
            .await
            .expect("Failed to fetch model files");
        OnnxEmbeddingModel::from_files(&files)
            .await
            .expect("Failed to load model")
    }

    #[tokio::test]
    #[ignore = "downloads all-MiniLM-L6-v2"]
    async fn test_embeddings_are_normalized_384_dims() {
        let model = load().await;
        assert_eq!(model.model_name(), "all-MiniLM-L6-v2");

        let embedding = model.embed("Hello world").await.unwrap();
        assert_eq!(embedding.len(), 384);
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-3, "norm was {}", norm);
    }

    #[tokio::test]
    #[ignore = "downloads all-MiniLM-L6-v2"]
    async fn test_batch_matches_single_and_keeps_order() {
        let model = load().await;
        let texts: Vec<String> = (0..40)
            .map(|i| format!("sentence number {} about cats", i))
            .collect();

        let batch = model.embed_batch(&texts).await.unwrap();
        assert_eq!(batch.len(), 40);

        let single = model.embed(&texts[37]).await.unwrap();
        assert!(cosine(&batch[37], &single) > 0.999);
    }

    #[tokio::test]
    #[ignore = "downloads all-MiniLM-L6-v2"]
    async fn test_similar_texts_are_closer() {
        let model: Box<dyn Embedder> = Box::new(load().await);
        let cat = model.embed("The cat sleeps on the sofa").await.unwrap();
        let kitten = model.embed("A kitten naps on the couch").await.unwrap();
        let stocks = model.embed("Interest rates moved the stock market").await.unwrap();

        assert!(cosine(&cat, &kitten) > cosine(&cat, &stocks));
    }
}
