// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Tests for exact L2 search

use local_rag_chat::vector::{FlatIndex, IndexError, VectorIndex};

#[cfg(test)]
mod flat_index_tests {
    use super::*;

    fn grid() -> FlatIndex {
        // Points on a line at x = 0, 1, 2, ... 9
        let vectors = (0..10).map(|i| vec![i as f32, 0.0]).collect();
        FlatIndex::build(vectors, 2).unwrap()
    }

    #[test]
    fn test_returns_exact_neighbours_in_distance_order() {
        let index = grid();
        let hits = index.search(&[6.2, 0.0], 3).unwrap();

        let ids: Vec<usize> = hits.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![6, 7, 5]);
        assert!((hits[0].distance - 0.2).abs() < 1e-5);
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[test]
    fn test_k_larger_than_index_returns_everything() {
        let index = grid();
        assert_eq!(index.search(&[0.0, 0.0], 50).unwrap().len(), 10);
        assert!(index.search(&[0.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_empty_index_returns_nothing() {
        let index = FlatIndex::build(vec![], 384).unwrap();
        assert!(index.is_empty());
        assert!(index.search(&vec![0.0; 384], 3).unwrap().is_empty());
    }

    #[test]
    fn test_dimension_mismatch_is_rejected() {
        let err = FlatIndex::build(vec![vec![1.0, 2.0], vec![1.0]], 2).unwrap_err();
        assert_eq!(
            err,
            IndexError::DimensionMismatch {
                index: 1,
                expected: 2,
                actual: 1
            }
        );

        let index = grid();
        assert!(matches!(
            index.search(&[1.0, 2.0, 3.0], 1),
            Err(IndexError::QueryDimensionMismatch {
                expected: 2,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_non_finite_values_are_rejected() {
        assert_eq!(
            FlatIndex::build(vec![vec![f32::NAN, 0.0]], 2).unwrap_err(),
            IndexError::NonFinite(0)
        );
        assert_eq!(
            grid().search(&[f32::INFINITY, 0.0], 1).unwrap_err(),
            IndexError::NonFiniteQuery
        );
    }
}
