//! Overlap estimation from match density.

use crate::config::StitchConfig;
use image::RgbImage;
use pano_core::Matches;
use pano_features::{detect_and_compute, Features, Matcher};

/// Heuristic shared-content estimate for one pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlapEstimate {
    /// In `[0, 1]`.
    pub fraction: f64,
    pub match_count: usize,
}

impl OverlapEstimate {
    pub const NONE: OverlapEstimate = OverlapEstimate {
        fraction: 0.0,
        match_count: 0,
    };

    /// Whether the pair is worth a homography attempt.
    pub fn is_eligible(&self, config: &StitchConfig) -> bool {
        self.fraction >= config.min_overlap && self.match_count >= config.min_matches
    }
}

/// Everything computed for a pair, reused by later stages.
#[derive(Debug, Clone)]
pub struct PairAnalysis {
    pub features1: Features,
    pub features2: Features,
    /// Query side is image 1, train side is image 2.
    pub matches: Matches,
    pub overlap: OverlapEstimate,
}

/// `min(1, matches / mean(keypoints) * 2)`, or 0 when either side has no keypoints.
pub fn overlap_fraction(match_count: usize, keypoints1: usize, keypoints2: usize) -> f64 {
    if keypoints1 == 0 || keypoints2 == 0 {
        return 0.0;
    }
    let mean = (keypoints1 + keypoints2) as f64 / 2.0;
    (match_count as f64 / mean * 2.0).min(1.0)
}

/// Extracts both images' features concurrently, matches them and estimates overlap.
pub fn analyze_pair(image1: &RgbImage, image2: &RgbImage, config: &StitchConfig) -> PairAnalysis {
    let (features1, features2) = rayon::join(
        || detect_and_compute(image1, config.max_features),
        || detect_and_compute(image2, config.max_features),
    );

    let matches = match (features1.descriptors(), features2.descriptors()) {
        (Some(d1), Some(d2)) => Matcher::new()
            .with_ratio_test(config.ratio)
            .match_descriptors(d1, d2),
        _ => Matches::new(),
    };

    let overlap = if features1.is_empty() || features2.is_empty() {
        OverlapEstimate::NONE
    } else {
        OverlapEstimate {
            fraction: overlap_fraction(matches.len(), features1.num_keypoints(), features2.num_keypoints()),
            match_count: matches.len(),
        }
    };

    PairAnalysis {
        features1,
        features2,
        matches,
        overlap,
    }
}
