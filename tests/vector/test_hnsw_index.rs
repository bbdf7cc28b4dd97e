// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Tests for the approximate cosine index

use local_rag_chat::vector::{HnswIndex, VectorIndex};

#[cfg(test)]
mod hnsw_index_tests {
    use super::*;

    /// Unit vectors pointing in distinct directions of a 384-d space
    fn basis_vectors(count: usize) -> Vec<Vec<f32>> {
        (0..count)
            .map(|i| {
                let mut v = vec![0.0; 384];
                v[i] = 1.0;
                v
            })
            .collect()
    }

    #[test]
    fn test_finds_the_matching_direction() {
        let index = HnswIndex::build(basis_vectors(20), 384).unwrap();
        assert_eq!(index.len(), 20);

        let mut query = vec![0.0; 384];
        query[7] = 2.0;
        query[3] = 0.5;

        let hits = index.search(&query, 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, 7);
        assert_eq!(hits[1].id, 3);
        assert!(hits[0].distance < hits[1].distance);
    }

    #[test]
    fn test_scale_does_not_change_ranking() {
        let mut vectors = basis_vectors(5);
        vectors[2] = vectors[2].iter().map(|x| x * 40.0).collect();
        let index = HnswIndex::build(vectors, 384).unwrap();

        let mut query = vec![0.0; 384];
        query[2] = 0.01;
        let hits = index.search(&query, 1).unwrap();
        assert_eq!(hits[0].id, 2);
        assert!(hits[0].distance.abs() < 1e-4);
    }

    #[test]
    fn test_single_vector_index() {
        let index = HnswIndex::build(basis_vectors(1), 384).unwrap();
        let hits = index.search(&basis_vectors(1)[0], 3).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, 0);
    }
}
