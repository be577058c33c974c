//! Brute-force L2 descriptor matching with Lowe's ratio test.

use crate::descriptor::Descriptors;
use pano_core::{FeatureMatch, Matches};
use rayon::prelude::*;

/// Up to `k` nearest train descriptors for one query descriptor, closest first.
pub type KnnMatch = Vec<FeatureMatch>;

#[derive(Debug, Clone)]
pub struct Matcher {
    ratio_threshold: f32,
}

impl Default for Matcher {
    fn default() -> Self {
        Self {
            ratio_threshold: 0.7,
        }
    }
}

impl Matcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ratio_test(mut self, threshold: f32) -> Self {
        self.ratio_threshold = threshold;
        self
    }

    /// Two-nearest-neighbour matching followed by the ratio test.
    pub fn match_descriptors(&self, query: &Descriptors, train: &Descriptors) -> Matches {
        let knn = knn_match(query, train, 2);
        filter_matches_by_ratio_test(&knn, self.ratio_threshold)
    }
}

/// Matches `query` against `train` with a 0.7 ratio test.
pub fn match_descriptors(query: &Descriptors, train: &Descriptors) -> Matches {
    Matcher::new().match_descriptors(query, train)
}

/// K-nearest neighbours by L2 distance. Output is indexed by query descriptor.
pub fn knn_match(query: &Descriptors, train: &Descriptors, k: usize) -> Vec<KnnMatch> {
    if k == 0 {
        return vec![Vec::new(); query.len()];
    }

    query
        .descriptors
        .par_iter()
        .enumerate()
        .map(|(query_idx, q_desc)| {
            let mut best: Vec<FeatureMatch> = Vec::with_capacity(k + 1);
            for (train_idx, t_desc) in train.iter().enumerate() {
                let distance = q_desc.squared_l2_distance(t_desc);
                if best.len() == k && distance >= best[k - 1].distance {
                    continue;
                }
                let pos = best.partition_point(|m| m.distance <= distance);
                best.insert(pos, FeatureMatch::new(query_idx, train_idx, distance));
                best.truncate(k);
            }
            for m in best.iter_mut() {
                m.distance = m.distance.sqrt();
            }
            best
        })
        .collect()
}

/// Keeps the best candidate of each query when it is strictly closer than
/// `ratio` times the second best. Queries with fewer than two candidates are dropped.
pub fn filter_matches_by_ratio_test(knn_matches: &[KnnMatch], ratio: f32) -> Matches {
    knn_matches
        .iter()
        .filter_map(|candidates| match candidates.as_slice() {
            [best, second, ..] if best.distance < ratio * second.distance => Some(*best),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pano_core::{Descriptor, KeyPoint};

    fn descriptors(rows: &[&[f32]]) -> Descriptors {
        rows.iter()
            .map(|r| Descriptor::new(r.to_vec(), KeyPoint::default()))
            .collect()
    }

    #[test]
    fn knn_is_sorted_and_bounded() {
        let query = descriptors(&[&[0.0, 0.0]]);
        let train = descriptors(&[&[3.0, 0.0], &[1.0, 0.0], &[2.0, 0.0], &[0.5, 0.0]]);
        let knn = knn_match(&query, &train, 2);
        assert_eq!(knn.len(), 1);
        assert_eq!(knn[0].len(), 2);
        assert_eq!(knn[0][0].train_idx, 3);
        assert_eq!(knn[0][1].train_idx, 1);
        assert!((knn[0][0].distance - 0.5).abs() < 1e-6);
    }

    #[test]
    fn ratio_test_rejects_ambiguous() {
        let query = descriptors(&[&[0.0, 0.0], &[10.0, 10.0]]);
        // First query: clear winner. Second: two equidistant candidates.
        let train = descriptors(&[&[0.1, 0.0], &[5.0, 5.0], &[10.0, 11.0], &[10.0, 9.0]]);
        let matches = match_descriptors(&query, &train);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches.matches[0].query_idx, 0);
        assert_eq!(matches.matches[0].train_idx, 0);
    }

    #[test]
    fn single_candidate_is_dropped() {
        let query = descriptors(&[&[0.0, 0.0]]);
        let train = descriptors(&[&[0.0, 0.0]]);
        assert!(match_descriptors(&query, &train).is_empty());
    }

    #[test]
    fn empty_inputs_yield_no_matches() {
        let empty = Descriptors::new();
        let some = descriptors(&[&[1.0], &[2.0]]);
        assert!(match_descriptors(&empty, &some).is_empty());
        assert!(match_descriptors(&some, &empty).is_empty());
    }

    #[test]
    fn ratio_is_strict() {
        let knn = vec![vec![FeatureMatch::new(0, 0, 0.7), FeatureMatch::new(0, 1, 1.0)]];
        assert!(filter_matches_by_ratio_test(&knn, 0.7).is_empty());
        assert_eq!(filter_matches_by_ratio_test(&knn, 0.71).len(), 1);
    }
}
