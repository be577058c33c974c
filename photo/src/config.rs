//! Stitching configuration.
//!
//! One immutable [`StitchConfig`] value is passed by reference into every
//! operation. It deserializes from JSON with missing fields taking defaults.

use pano_core::RobustConfig;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How the stitching axis is chosen for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisMode {
    /// Infer from the first pair's correspondences, then image shapes.
    #[default]
    Auto,
    Horizontal,
    Vertical,
}

/// The resolved axis along which images are joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StitchAxis {
    Horizontal,
    Vertical,
}

impl fmt::Display for StitchAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StitchAxis::Horizontal => f.write_str("horizontal"),
            StitchAxis::Vertical => f.write_str("vertical"),
        }
    }
}

/// Where a new image goes relative to the canvas in vertical fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerticalPlacement {
    #[default]
    Above,
    Below,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StitchConfig {
    // Features and matching
    pub max_features: usize,
    /// Lowe ratio: keep a match only if best < ratio * second best.
    pub ratio: f32,

    // Homography
    /// Maximum reprojection error (px) for a RANSAC inlier.
    pub ransac_threshold: f64,
    pub ransac_max_iterations: usize,
    pub ransac_confidence: f64,
    pub ransac_seed: Option<u64>,

    // Eligibility for geometric alignment
    pub min_matches: usize,
    pub min_overlap: f64,

    // Canvas
    /// Largest allowed warped canvas side.
    pub max_canvas_dim: u32,
    /// Fallback centre-crops the larger side when the mismatch exceeds this.
    pub max_height_difference: u32,
    /// Luminance strictly above this counts as content when cropping.
    pub crop_threshold: u8,

    // Axis detection
    pub axis_min_matches: usize,
    pub variance_factor: f64,
    pub portrait_ratio: f64,
    pub landscape_ratio: f64,

    // Vertical stacking order
    pub order_min_matches: usize,
    pub order_shift_threshold: f64,
    pub default_vertical_placement: VerticalPlacement,
}

impl Default for StitchConfig {
    fn default() -> Self {
        Self {
            max_features: 5000,
            ratio: 0.7,
            ransac_threshold: 5.0,
            ransac_max_iterations: 2000,
            ransac_confidence: 0.995,
            ransac_seed: None,
            min_matches: 10,
            min_overlap: 0.10,
            max_canvas_dim: 10_000,
            max_height_difference: 20,
            crop_threshold: 10,
            axis_min_matches: 10,
            variance_factor: 2.0,
            portrait_ratio: 1.2,
            landscape_ratio: 0.8,
            order_min_matches: 5,
            order_shift_threshold: 10.0,
            default_vertical_placement: VerticalPlacement::Above,
        }
    }
}

impl StitchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_features(mut self, n: usize) -> Self {
        self.max_features = n;
        self
    }

    pub fn with_ratio(mut self, ratio: f32) -> Self {
        self.ratio = ratio;
        self
    }

    pub fn with_ransac_threshold(mut self, threshold: f64) -> Self {
        self.ransac_threshold = threshold;
        self
    }

    pub fn with_ransac_seed(mut self, seed: Option<u64>) -> Self {
        self.ransac_seed = seed;
        self
    }

    pub fn with_min_matches(mut self, n: usize) -> Self {
        self.min_matches = n;
        self
    }

    pub fn with_min_overlap(mut self, fraction: f64) -> Self {
        self.min_overlap = fraction;
        self
    }

    pub fn with_max_canvas_dim(mut self, dim: u32) -> Self {
        self.max_canvas_dim = dim;
        self
    }

    pub fn with_crop_threshold(mut self, threshold: u8) -> Self {
        self.crop_threshold = threshold;
        self
    }

    pub fn with_default_vertical_placement(mut self, placement: VerticalPlacement) -> Self {
        self.default_vertical_placement = placement;
        self
    }

    /// RANSAC parameters derived from this configuration.
    pub fn ransac(&self) -> RobustConfig {
        RobustConfig {
            threshold: self.ransac_threshold,
            max_iterations: self.ransac_max_iterations,
            confidence: self.ransac_confidence,
            seed: self.ransac_seed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = StitchConfig::default();
        assert_eq!(c.max_features, 5000);
        assert_eq!(c.min_matches, 10);
        assert_eq!(c.max_canvas_dim, 10_000);
        assert_eq!(c.default_vertical_placement, VerticalPlacement::Above);
        let r = c.ransac();
        assert_eq!(r.threshold, 5.0);
        assert_eq!(r.max_iterations, 2000);
        assert!(r.seed.is_none());
    }

    #[test]
    fn partial_json_uses_defaults() {
        let c: StitchConfig =
            serde_json::from_str(r#"{ "min_matches": 25, "default_vertical_placement": "below" }"#).unwrap();
        assert_eq!(c.min_matches, 25);
        assert_eq!(c.default_vertical_placement, VerticalPlacement::Below);
        assert_eq!(c.ratio, 0.7);
        assert_eq!(c.crop_threshold, 10);
    }

    #[test]
    fn json_roundtrip_preserves_seed() {
        let c = StitchConfig::new().with_ransac_seed(Some(3)).with_min_overlap(0.2);
        let back: StitchConfig = serde_json::from_str(&serde_json::to_string(&c).unwrap()).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn builders_feed_ransac_parameters() {
        let c = StitchConfig::new()
            .with_max_features(800)
            .with_ratio(0.6)
            .with_ransac_threshold(3.0)
            .with_max_canvas_dim(4000)
            .with_crop_threshold(0);
        assert_eq!(c.max_features, 800);
        assert_eq!(c.ratio, 0.6);
        assert_eq!(c.max_canvas_dim, 4000);
        assert_eq!(c.crop_threshold, 0);
        assert_eq!(c.ransac().threshold, 3.0);
    }
}
