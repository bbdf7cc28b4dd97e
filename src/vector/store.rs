// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Chunk store backed by a similarity index
//!
//! Rebuilt from scratch on every run: embed all chunks, index the
//! vectors, keep the chunk payloads alongside so hits map back to text.

use super::{FlatIndex, HnswIndex, IndexError, VectorIndex};
use crate::config::IndexKind;
use crate::embeddings::Embedder;
use crate::rag::Chunk;
use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// A retrieved chunk and its distance to the query (lower is closer)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub distance: f32,
}

pub struct VectorStore {
    chunks: Vec<Chunk>,
    index: Box<dyn VectorIndex>,
    kind: IndexKind,
}

impl std::fmt::Debug for VectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStore")
            .field("chunks", &self.chunks.len())
            .field("kind", &self.kind)
            .field("dimensions", &self.index.dimensions())
            .finish()
    }
}

impl VectorStore {
    /// Embed `chunks` with `embedder` and index the vectors
    pub async fn from_chunks(
        chunks: Vec<Chunk>,
        embedder: &dyn Embedder,
        kind: IndexKind,
    ) -> Result<Self> {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        info!("Embedding {} chunks", texts.len());

        let embeddings = embedder
            .embed_batch(&texts)
            .await
            .context("Failed to embed chunks")?;

        let store = Self::from_embeddings(chunks, embeddings, embedder.dimension(), kind)?;
        info!(
            "Built {:?} index with {} vectors",
            store.kind,
            store.index.len()
        );
        Ok(store)
    }

    /// Index precomputed embeddings; `embeddings[i]` belongs to `chunks[i]`
    pub fn from_embeddings(
        chunks: Vec<Chunk>,
        embeddings: Vec<Vec<f32>>,
        dimensions: usize,
        kind: IndexKind,
    ) -> Result<Self, IndexError> {
        if embeddings.len() != chunks.len() {
            return Err(IndexError::CountMismatch {
                vectors: embeddings.len(),
                chunks: chunks.len(),
            });
        }

        let index: Box<dyn VectorIndex> = match kind {
            IndexKind::Flat => Box::new(FlatIndex::build(embeddings, dimensions)?),
            IndexKind::Hnsw => Box::new(HnswIndex::build(embeddings, dimensions)?),
        };

        Ok(Self {
            chunks,
            index,
            kind,
        })
    }

    /// The `k` chunks nearest to `query`, closest first
    pub fn similarity_search_by_vector(
        &self,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredChunk>, IndexError> {
        let hits = self.index.search(query, k)?;
        Ok(hits
            .into_iter()
            .filter_map(|hit| {
                self.chunks.get(hit.id).map(|chunk| ScoredChunk {
                    chunk: chunk.clone(),
                    distance: hit.distance,
                })
            })
            .collect())
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn kind(&self) -> IndexKind {
        self.kind
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }
}

/// Embeds a question and fetches its top-k chunks
#[derive(Clone)]
pub struct Retriever {
    store: Arc<VectorStore>,
    embedder: Arc<dyn Embedder>,
    k: usize,
}

impl Retriever {
    pub fn new(store: Arc<VectorStore>, embedder: Arc<dyn Embedder>, k: usize) -> Self {
        Self { store, embedder, k }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub async fn retrieve(&self, question: &str) -> Result<Vec<ScoredChunk>> {
        let query = self
            .embedder
            .embed(question)
            .await
            .context("Failed to embed question")?;
        let hits = self.store.similarity_search_by_vector(&query, self.k)?;
        debug!(
            "Retrieved {} chunks (best distance {:?})",
            hits.len(),
            hits.first().map(|h| h.distance)
        );
        Ok(hits)
    }
}
