// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Tests for the chunk store and retriever

use crate::common::KeywordEmbedder;
use local_rag_chat::config::IndexKind;
use local_rag_chat::rag::Chunk;
use local_rag_chat::vector::{IndexError, Retriever, VectorStore};
use std::path::PathBuf;
use std::sync::Arc;

#[cfg(test)]
mod store_tests {
    use super::*;

    fn chunk(text: &str) -> Chunk {
        Chunk {
            text: text.to_string(),
            source: PathBuf::from("docs/notas.txt"),
            index: 0,
        }
    }

    #[tokio::test]
    async fn test_store_maps_hits_back_to_chunks() {
        let embedder = KeywordEmbedder::new(&["rust", "python"]);
        let chunks = vec![chunk("python python"), chunk("rust e cargo"), chunk("rust rust")];

        for kind in [IndexKind::Flat, IndexKind::Hnsw] {
            let store = VectorStore::from_chunks(chunks.clone(), &embedder, kind)
                .await
                .unwrap();
            assert_eq!(store.len(), 3);
            assert_eq!(store.kind(), kind);

            let hits = store.similarity_search_by_vector(&[1.0, 0.0], 1).unwrap();
            assert_eq!(hits.len(), 1);
            assert!(hits[0].chunk.text.starts_with("rust"), "{:?}: {:?}", kind, hits);
        }
    }

    #[test]
    fn test_count_mismatch_is_rejected() {
        let err = VectorStore::from_embeddings(
            vec![chunk("a"), chunk("b")],
            vec![vec![1.0]],
            1,
            IndexKind::Flat,
        )
        .unwrap_err();
        assert_eq!(err, IndexError::CountMismatch { vectors: 1, chunks: 2 });
    }

    #[tokio::test]
    async fn test_retriever_returns_k_nearest() {
        let embedder = Arc::new(KeywordEmbedder::new(&["chuva", "sol"]));
        let chunks = vec![
            chunk("sol forte"),
            chunk("chuva fina"),
            chunk("chuva e sol"),
            chunk("chuva chuva"),
        ];
        let store = VectorStore::from_chunks(chunks, embedder.as_ref(), IndexKind::Flat)
            .await
            .unwrap();

        let retriever = Retriever::new(Arc::new(store), embedder, 2);
        let hits = retriever.retrieve("vai ter chuva?").await.unwrap();

        let texts: Vec<&str> = hits.iter().map(|h| h.chunk.text.as_str()).collect();
        assert_eq!(texts, vec!["chuva fina", "chuva e sol"]);
        assert_eq!(retriever.k(), 2);
    }
}
