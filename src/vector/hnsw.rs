// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! HNSW Index for approximate vector search
//!
//! Hierarchical Navigable Small World graph (via `hnsw_rs`) with cosine
//! distance. Vectors are normalised on the way in so the reported
//! distance is `1 - cosine_similarity`.
//!
//! ```rust,ignore
//! use local_rag_chat::vector::{HnswIndex, VectorIndex};
//!
//! let index = HnswIndex::build(embeddings, 384)?;
//! let hits = index.search(&query, 3)?;
//! ```

use super::{validate_query, validate_vectors, IndexError, Neighbor, VectorIndex};
use hnsw_rs::hnsw::{Hnsw, Neighbour};
use hnsw_rs::prelude::*;

/// Connections per node (the M parameter)
const MAX_NB_CONNECTION: usize = 16;
/// Candidate list size while building
const EF_CONSTRUCTION: usize = 200;
/// `hnsw_rs` supports at most 16 layers
const MAX_LAYERS: usize = 16;

pub struct HnswIndex {
    hnsw: Hnsw<'static, f32, DistCosine>,
    len: usize,
    dimensions: usize,
}

impl std::fmt::Debug for HnswIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HnswIndex")
            .field("len", &self.len)
            .field("dimensions", &self.dimensions)
            .finish_non_exhaustive()
    }
}

impl HnswIndex {
    /// Build the graph from `vectors`; ids are the positions in the input
    ///
    /// # Errors
    ///
    /// Wrong dimensions or NaN/Infinity components in any vector.
    pub fn build(vectors: Vec<Vec<f32>>, dimensions: usize) -> Result<Self, IndexError> {
        validate_vectors(&vectors, dimensions)?;

        let len = vectors.len();
        // log2(n) layers, clamped to what hnsw_rs accepts
        let nb_layer = if len > 1 {
            ((len as f32).log2().ceil() as usize).clamp(4, MAX_LAYERS)
        } else {
            4
        };

        let mut hnsw: Hnsw<f32, DistCosine> = Hnsw::new(
            MAX_NB_CONNECTION,
            len.max(1),
            nb_layer,
            EF_CONSTRUCTION,
            DistCosine,
        );

        for (id, vector) in vectors.iter().enumerate() {
            let normalized = normalize_vector(vector);
            hnsw.insert((normalized.as_slice(), id));
        }
        hnsw.set_searching_mode(true);

        Ok(Self {
            hnsw,
            len,
            dimensions,
        })
    }
}

impl VectorIndex for HnswIndex {
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, IndexError> {
        validate_query(query, self.dimensions)?;
        if k == 0 || self.len == 0 {
            return Ok(vec![]);
        }

        let normalized = normalize_vector(query);
        let k = k.min(self.len);
        // ef_search should be >= k (typically 1.5-2x k)
        let ef_search = (k * 2).max(50);
        let neighbours: Vec<Neighbour> = self.hnsw.search(&normalized, k, ef_search);

        let mut hits: Vec<Neighbor> = neighbours
            .into_iter()
            .map(|n| Neighbor {
                id: n.d_id,
                distance: n.distance,
            })
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance).then(a.id.cmp(&b.id)));
        hits.truncate(k);
        Ok(hits)
    }

    fn len(&self) -> usize {
        self.len
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Divide by the L2 norm; zero vectors are returned unchanged
fn normalize_vector(vector: &[f32]) -> Vec<f32> {
    let magnitude: f32 = vector.iter().map(|&x| x * x).sum::<f32>().sqrt();

    if magnitude == 0.0 || !magnitude.is_finite() {
        return vector.to_vec();
    }

    vector.iter().map(|&x| x / magnitude).collect()
}
