// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Tests for the retrieval QA chain over an in-memory store

use crate::common::{KeywordEmbedder, RecordingGenerator};
use local_rag_chat::config::IndexKind;
use local_rag_chat::inference::GenerationParams;
use local_rag_chat::rag::{Chunk, PromptTemplate, RetrievalQa};
use local_rag_chat::vector::{Retriever, VectorStore};
use std::path::PathBuf;
use std::sync::Arc;

#[cfg(test)]
mod chain_tests {
    use super::*;

    fn chunks() -> Vec<Chunk> {
        [
            ("o gato dorme", "docs/gatos.txt"),
            ("o cachorro late", "docs/caes.txt"),
            ("o peixe nada", "docs/peixes.txt"),
            ("gato e gato", "docs/gatos.txt"),
        ]
        .iter()
        .enumerate()
        .map(|(index, (text, source))| Chunk {
            text: text.to_string(),
            source: PathBuf::from(source),
            index,
        })
        .collect()
    }

    async fn chain(k: usize, generator: Arc<RecordingGenerator>) -> RetrievalQa {
        let embedder = Arc::new(KeywordEmbedder::new(&["gato", "cachorro", "peixe"]));
        let store = VectorStore::from_chunks(chunks(), embedder.as_ref(), IndexKind::Flat)
            .await
            .unwrap();
        RetrievalQa::new(
            Retriever::new(Arc::new(store), embedder, k),
            generator,
            PromptTemplate::default_qa().unwrap(),
            GenerationParams::default(),
        )
    }

    #[tokio::test]
    async fn test_prompt_contains_exactly_the_top_k_chunks() {
        let generator = Arc::new(RecordingGenerator::new(" Ele dorme. "));
        let qa = chain(2, generator.clone()).await;

        let answer = qa.answer("o que o gato faz?").await.unwrap();
        assert_eq!(answer.text, "Ele dorme.");
        assert_eq!(answer.sources, vec![PathBuf::from("docs/gatos.txt")]);

        let prompts = generator.prompts();
        assert_eq!(prompts.len(), 1);
        assert_eq!(
            prompts[0],
            "\nUse as informações abaixo para responder a pergunta de forma breve e clara. \
             Se não souber, responda 'Não sei'.\n\n\
             Informações:\no gato dorme\n\ngato e gato\n\n\
             Pergunta: o que o gato faz?\nResposta:\n"
        );
    }

    #[tokio::test]
    async fn test_ties_keep_insertion_order() {
        let generator = Arc::new(RecordingGenerator::new("ok"));
        let qa = chain(3, generator.clone()).await;

        let answer = qa.answer("gato").await.unwrap();
        assert_eq!(
            answer.sources,
            vec![PathBuf::from("docs/gatos.txt"), PathBuf::from("docs/caes.txt")]
        );
        let prompt = &generator.prompts()[0];
        assert!(prompt.contains("o gato dorme\n\ngato e gato\n\no cachorro late"));
        assert!(!prompt.contains("peixe"));
    }

    #[tokio::test]
    async fn test_k_larger_than_store_uses_every_chunk() {
        let generator = Arc::new(RecordingGenerator::new("ok"));
        let qa = chain(10, generator.clone()).await;

        qa.answer("peixe").await.unwrap();
        let prompt = &generator.prompts()[0];
        for chunk in chunks() {
            assert!(prompt.contains(&chunk.text), "missing {}", chunk.text);
        }
    }
}
