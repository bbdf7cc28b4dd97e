// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Exact nearest-neighbour search by L2 distance
//!
//! Brute force over every stored vector. For a folder of text files the
//! store holds a few thousand vectors at most, where a full scan is both
//! exact and fast.

use super::{validate_query, validate_vectors, IndexError, Neighbor, VectorIndex};

#[derive(Debug, Clone)]
pub struct FlatIndex {
    /// Row-major `len x dimensions`
    data: Vec<f32>,
    dimensions: usize,
    len: usize,
}

impl FlatIndex {
    pub fn build(vectors: Vec<Vec<f32>>, dimensions: usize) -> Result<Self, IndexError> {
        validate_vectors(&vectors, dimensions)?;

        let len = vectors.len();
        let data = vectors.into_iter().flatten().collect();
        Ok(Self {
            data,
            dimensions,
            len,
        })
    }
}

fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

impl VectorIndex for FlatIndex {
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, IndexError> {
        validate_query(query, self.dimensions)?;
        if k == 0 || self.len == 0 {
            return Ok(vec![]);
        }

        let mut neighbors: Vec<Neighbor> = self
            .data
            .chunks(self.dimensions.max(1))
            .take(self.len)
            .enumerate()
            .map(|(id, row)| Neighbor {
                id,
                distance: l2_distance(row, query),
            })
            .collect();

        // Stable sort keeps insertion order between equal distances
        neighbors.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        neighbors.truncate(k);
        Ok(neighbors)
    }

    fn len(&self) -> usize {
        self.len
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
