// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// In-memory similarity search over chunk embeddings

pub mod flat;
pub mod hnsw;
pub mod store;

pub use flat::FlatIndex;
pub use hnsw::HnswIndex;
pub use store::{Retriever, ScoredChunk, VectorStore};

use thiserror::Error;

/// One hit from an index: the insertion ordinal and its distance (lower is closer)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub id: usize,
    pub distance: f32,
}

#[derive(Error, Debug, PartialEq)]
pub enum IndexError {
    #[error("Vector {index} has wrong dimensions: expected {expected}, got {actual}")]
    DimensionMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Query has wrong dimensions: expected {expected}, got {actual}")]
    QueryDimensionMismatch { expected: usize, actual: usize },

    #[error("Vector {0} contains NaN or Infinity values")]
    NonFinite(usize),

    #[error("Query contains NaN or Infinity values")]
    NonFiniteQuery,

    #[error("Got {vectors} embeddings for {chunks} chunks")]
    CountMismatch { vectors: usize, chunks: usize },
}

/// Nearest-neighbour search over a fixed set of vectors
pub trait VectorIndex: Send + Sync {
    /// Up to `k` closest vectors, closest first
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, IndexError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn dimensions(&self) -> usize;
}

/// Reject vectors of the wrong width or with NaN/Infinity components
pub(crate) fn validate_vectors(vectors: &[Vec<f32>], dimensions: usize) -> Result<(), IndexError> {
    for (index, vector) in vectors.iter().enumerate() {
        if vector.len() != dimensions {
            return Err(IndexError::DimensionMismatch {
                index,
                expected: dimensions,
                actual: vector.len(),
            });
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(IndexError::NonFinite(index));
        }
    }
    Ok(())
}

pub(crate) fn validate_query(query: &[f32], dimensions: usize) -> Result<(), IndexError> {
    if query.len() != dimensions {
        return Err(IndexError::QueryDimensionMismatch {
            expected: dimensions,
            actual: query.len(),
        });
    }
    if query.iter().any(|v| !v.is_finite()) {
        return Err(IndexError::NonFiniteQuery);
    }
    Ok(())
}
