//! Stitching-axis inference and vertical stacking order.
//!
//! Both decisions come from the displacement `p2 - p1` of every matched pair,
//! where `p1` lies in the canvas (query side) and `p2` in the new image.

use crate::config::{StitchAxis, StitchConfig, VerticalPlacement};
use pano_core::{KeyPoints, Matches};

/// Summary statistics of match displacements.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplacementStats {
    pub count: usize,
    pub mean_dx: f64,
    pub mean_dy: f64,
    pub mean_abs_dx: f64,
    pub mean_abs_dy: f64,
    /// Population variance.
    pub var_dx: f64,
    pub var_dy: f64,
}

impl DisplacementStats {
    pub fn from_displacements(displacements: &[(f64, f64)]) -> Option<Self> {
        if displacements.is_empty() {
            return None;
        }
        let n = displacements.len() as f64;
        let mean_dx = displacements.iter().map(|d| d.0).sum::<f64>() / n;
        let mean_dy = displacements.iter().map(|d| d.1).sum::<f64>() / n;
        Some(Self {
            count: displacements.len(),
            mean_dx,
            mean_dy,
            mean_abs_dx: displacements.iter().map(|d| d.0.abs()).sum::<f64>() / n,
            mean_abs_dy: displacements.iter().map(|d| d.1.abs()).sum::<f64>() / n,
            var_dx: displacements.iter().map(|d| (d.0 - mean_dx).powi(2)).sum::<f64>() / n,
            var_dy: displacements.iter().map(|d| (d.1 - mean_dy).powi(2)).sum::<f64>() / n,
        })
    }
}

/// `p2 - p1` for every match whose indices resolve.
pub fn displacements(keypoints1: &KeyPoints, keypoints2: &KeyPoints, matches: &Matches) -> Vec<(f64, f64)> {
    matches
        .point_pairs(keypoints1, keypoints2)
        .into_iter()
        .map(|(p1, p2)| (p2.x - p1.x, p2.y - p1.y))
        .collect()
}

/// Axis implied by displacement statistics, if it is unambiguous.
pub fn classify_displacements(stats: &DisplacementStats, variance_factor: f64) -> Option<StitchAxis> {
    if stats.mean_abs_dx > stats.mean_abs_dy && stats.var_dx < variance_factor * stats.var_dy {
        Some(StitchAxis::Horizontal)
    } else if stats.mean_abs_dy > stats.mean_abs_dx && stats.var_dy < variance_factor * stats.var_dx {
        Some(StitchAxis::Vertical)
    } else {
        None
    }
}

/// Axis implied by image shapes: both portrait means vertical, both landscape horizontal.
pub fn aspect_axis(dims1: (u32, u32), dims2: (u32, u32), config: &StitchConfig) -> Option<StitchAxis> {
    let ratio = |(w, h): (u32, u32)| if w == 0 { f64::INFINITY } else { h as f64 / w as f64 };
    let (r1, r2) = (ratio(dims1), ratio(dims2));
    if r1 > config.portrait_ratio && r2 > config.portrait_ratio {
        Some(StitchAxis::Vertical)
    } else if r1 < config.landscape_ratio && r2 < config.landscape_ratio {
        Some(StitchAxis::Horizontal)
    } else {
        None
    }
}

/// Infers the stitching axis for a pair; `None` means undecided.
///
/// `dims` are `(width, height)`.
pub fn detect_axis(
    keypoints1: &KeyPoints,
    keypoints2: &KeyPoints,
    matches: &Matches,
    dims1: (u32, u32),
    dims2: (u32, u32),
    config: &StitchConfig,
) -> Option<StitchAxis> {
    if matches.len() < config.axis_min_matches {
        return None;
    }
    let stats = DisplacementStats::from_displacements(&displacements(keypoints1, keypoints2, matches))?;
    classify_displacements(&stats, config.variance_factor).or_else(|| aspect_axis(dims1, dims2, config))
}

/// Where the new image goes in vertical fallback.
pub fn vertical_placement(
    keypoints1: Option<&KeyPoints>,
    keypoints2: Option<&KeyPoints>,
    matches: &Matches,
    config: &StitchConfig,
) -> VerticalPlacement {
    let (Some(k1), Some(k2)) = (keypoints1, keypoints2) else {
        return config.default_vertical_placement;
    };
    if matches.len() < config.order_min_matches {
        return config.default_vertical_placement;
    }
    let Some(stats) = DisplacementStats::from_displacements(&displacements(k1, k2, matches)) else {
        return config.default_vertical_placement;
    };
    if stats.mean_dy < -config.order_shift_threshold {
        VerticalPlacement::Above
    } else if stats.mean_dy > config.order_shift_threshold {
        VerticalPlacement::Below
    } else {
        config.default_vertical_placement
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pano_core::{FeatureMatch, KeyPoint};

    fn pairs(disp: &[(f64, f64)]) -> (KeyPoints, KeyPoints, Matches) {
        let mut k1 = KeyPoints::new();
        let mut k2 = KeyPoints::new();
        let mut m = Matches::new();
        for (i, &(dx, dy)) in disp.iter().enumerate() {
            let (x, y) = (100.0 + i as f64, 50.0 + (i % 7) as f64);
            k1.push(KeyPoint::new(x, y));
            k2.push(KeyPoint::new(x + dx, y + dy));
            m.push(FeatureMatch::new(i, i, 0.0));
        }
        (k1, k2, m)
    }

    /// Large steady dx with small, noisy dy.
    fn horizontal_shift() -> Vec<(f64, f64)> {
        (0..20)
            .map(|i| (-200.0 + (i % 2) as f64, if i % 2 == 0 { 3.0 } else { -3.0 }))
            .collect()
    }

    #[test]
    fn stats_are_population() {
        let s = DisplacementStats::from_displacements(&[(1.0, -2.0), (3.0, 2.0)]).unwrap();
        assert_eq!(s.mean_dx, 2.0);
        assert_eq!(s.mean_abs_dy, 2.0);
        assert_eq!(s.var_dx, 1.0);
        assert_eq!(s.var_dy, 4.0);
        assert!(DisplacementStats::from_displacements(&[]).is_none());
    }

    #[test]
    fn horizontal_and_vertical_classification() {
        let config = StitchConfig::default();
        let (k1, k2, m) = pairs(&horizontal_shift());
        assert_eq!(
            detect_axis(&k1, &k2, &m, (400, 300), (400, 300), &config),
            Some(StitchAxis::Horizontal)
        );

        let swapped: Vec<(f64, f64)> = horizontal_shift().into_iter().map(|(dx, dy)| (dy, dx)).collect();
        let (k1, k2, m) = pairs(&swapped);
        assert_eq!(
            detect_axis(&k1, &k2, &m, (400, 300), (400, 300), &config),
            Some(StitchAxis::Vertical)
        );
    }

    #[test]
    fn classify_reference_statistics() {
        let stats = |mean_abs_dx: f64, mean_abs_dy: f64, var_dx: f64, var_dy: f64| DisplacementStats {
            count: 20,
            mean_dx: -mean_abs_dx,
            mean_dy: mean_abs_dy,
            mean_abs_dx,
            mean_abs_dy,
            var_dx,
            var_dy,
        };
        assert_eq!(
            classify_displacements(&stats(50.0, 2.0, 5.0, 50.0), 2.0),
            Some(StitchAxis::Horizontal)
        );
        assert_eq!(
            classify_displacements(&stats(2.0, 50.0, 50.0, 5.0), 2.0),
            Some(StitchAxis::Vertical)
        );
    }

    #[test]
    fn too_few_matches_is_unknown() {
        let (k1, k2, m) = pairs(&horizontal_shift()[..9]);
        assert_eq!(
            detect_axis(&k1, &k2, &m, (400, 300), (400, 300), &StitchConfig::default()),
            None
        );
    }

    #[test]
    fn ambiguous_motion_uses_aspect_ratio() {
        let config = StitchConfig::default();
        // Equal magnitudes on both axes.
        let disp: Vec<(f64, f64)> = (0..12).map(|i| (i as f64, i as f64)).collect();
        let (k1, k2, m) = pairs(&disp);
        assert_eq!(
            detect_axis(&k1, &k2, &m, (100, 200), (100, 180), &config),
            Some(StitchAxis::Vertical)
        );
        assert_eq!(
            detect_axis(&k1, &k2, &m, (200, 100), (200, 120), &config),
            Some(StitchAxis::Horizontal)
        );
        assert_eq!(detect_axis(&k1, &k2, &m, (100, 100), (200, 100), &config), None);
    }

    #[test]
    fn placement_follows_mean_dy() {
        let config = StitchConfig::default();
        let up: Vec<(f64, f64)> = (0..6).map(|_| (0.0, -40.0)).collect();
        let (k1, k2, m) = pairs(&up);
        assert_eq!(vertical_placement(Some(&k1), Some(&k2), &m, &config), VerticalPlacement::Above);

        let down: Vec<(f64, f64)> = (0..6).map(|_| (0.0, 40.0)).collect();
        let (k1, k2, m) = pairs(&down);
        assert_eq!(vertical_placement(Some(&k1), Some(&k2), &m, &config), VerticalPlacement::Below);

        let below_default = config.clone().with_default_vertical_placement(VerticalPlacement::Below);
        let flat: Vec<(f64, f64)> = (0..6).map(|_| (0.0, 4.0)).collect();
        let (k1, k2, m) = pairs(&flat);
        assert_eq!(
            vertical_placement(Some(&k1), Some(&k2), &m, &below_default),
            VerticalPlacement::Below
        );
    }

    #[test]
    fn placement_without_matches_is_default() {
        let config = StitchConfig::default();
        assert_eq!(
            vertical_placement(None, None, &Matches::new(), &config),
            VerticalPlacement::Above
        );
        let (k1, k2, m) = pairs(&[(0.0, 50.0); 4]);
        assert_eq!(vertical_placement(Some(&k1), Some(&k2), &m, &config), VerticalPlacement::Above);
    }
}
