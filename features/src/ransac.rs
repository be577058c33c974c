//! RANSAC (Random Sample Consensus) for geometric verification
//!
//! Robustly fits the projective transform relating two views from feature
//! matches that contain outliers.

use crate::{FeatureError, Result};
use nalgebra::{DMatrix, Matrix3, Point2, Vector3};
use pano_core::{KeyPoints, Matches, Ransac, RobustConfig, RobustModel};

pub type RansacConfig = RobustConfig;

/// Fewest inliers a homography must explain to be accepted.
pub const MIN_HOMOGRAPHY_INLIERS: usize = 4;

/// One correspondence: `src` maps onto `dst` under the fitted homography.
#[derive(Clone, Copy, Debug)]
pub struct MatchPair {
    pub src: Point2<f64>,
    pub dst: Point2<f64>,
}

/// Outcome of a successful fit.
#[derive(Debug, Clone)]
pub struct HomographyFit {
    /// Maps source (train) points into the destination (query) frame, `H[(2,2)] = 1`.
    pub homography: Matrix3<f64>,
    /// Per-match inlier flags, aligned with the input matches.
    pub inliers: Vec<bool>,
    pub num_inliers: usize,
    /// Mean reprojection error over the inliers.
    pub residual: f64,
}

/// Normalised DLT homography solver.
pub struct HomographyEstimator;

impl RobustModel<MatchPair> for HomographyEstimator {
    type Model = Matrix3<f64>;

    fn min_sample_size(&self) -> usize {
        4
    }

    fn estimate(&self, data: &[&MatchPair]) -> Option<Self::Model> {
        if data.len() < 4 {
            return None;
        }
        let src: Vec<Point2<f64>> = data.iter().map(|m| m.src).collect();
        let dst: Vec<Point2<f64>> = data.iter().map(|m| m.dst).collect();
        let t_src = normalizing_transform(&src)?;
        let t_dst = normalizing_transform(&dst)?;

        let mut a = vec![0.0f64; data.len() * 2 * 9];
        for (i, (s, d)) in src.iter().zip(dst.iter()).enumerate() {
            let s = t_src * Vector3::new(s.x, s.y, 1.0);
            let d = t_dst * Vector3::new(d.x, d.y, 1.0);
            let (x1, y1) = (s[0], s[1]);
            let (x2, y2) = (d[0], d[1]);
            let r1 = i * 2 * 9;
            let r2 = r1 + 9;
            a[r1] = -x1;
            a[r1 + 1] = -y1;
            a[r1 + 2] = -1.0;
            a[r1 + 6] = x2 * x1;
            a[r1 + 7] = x2 * y1;
            a[r1 + 8] = x2;
            a[r2 + 3] = -x1;
            a[r2 + 4] = -y1;
            a[r2 + 5] = -1.0;
            a[r2 + 6] = y2 * x1;
            a[r2 + 7] = y2 * y1;
            a[r2 + 8] = y2;
        }

        let h_norm = solve_dlt_homography(&a, data.len() * 2)?;
        let t_dst_inv = t_dst.try_inverse()?;
        normalize_homography(&(t_dst_inv * h_norm * t_src))
    }

    fn compute_error(&self, model: &Self::Model, data: &MatchPair) -> f64 {
        let p = model * Vector3::new(data.src.x, data.src.y, 1.0);
        if p[2].abs() > 1e-10 {
            let x = p[0] / p[2];
            let y = p[1] / p[2];
            ((x - data.dst.x).powi(2) + (y - data.dst.y).powi(2)).sqrt()
        } else {
            f64::INFINITY
        }
    }

    fn is_degenerate(&self, sample: &[&MatchPair]) -> bool {
        has_collinear_triple(sample.iter().map(|m| m.src))
            || has_collinear_triple(sample.iter().map(|m| m.dst))
    }
}

/// Similarity transform moving the centroid to the origin and the mean
/// distance from it to sqrt(2).
fn normalizing_transform(points: &[Point2<f64>]) -> Option<Matrix3<f64>> {
    let n = points.len() as f64;
    let cx = points.iter().map(|p| p.x).sum::<f64>() / n;
    let cy = points.iter().map(|p| p.y).sum::<f64>() / n;
    let mean_dist = points
        .iter()
        .map(|p| ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;
    if !mean_dist.is_finite() || mean_dist < 1e-12 {
        return None;
    }
    let s = std::f64::consts::SQRT_2 / mean_dist;
    Some(Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0))
}

fn has_collinear_triple(points: impl Iterator<Item = Point2<f64>>) -> bool {
    let pts: Vec<Point2<f64>> = points.collect();
    for i in 0..pts.len() {
        for j in i + 1..pts.len() {
            for k in j + 1..pts.len() {
                let (a, b, c) = (pts[i], pts[j], pts[k]);
                let cross = (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x);
                let scale = (b - a).norm() * (c - a).norm();
                if cross.abs() <= 1e-9 * scale.max(1.0) {
                    return true;
                }
            }
        }
    }
    false
}

/// Null vector of the DLT system via SVD.
fn solve_dlt_homography(a: &[f64], n_rows: usize) -> Option<Matrix3<f64>> {
    let mut matrix = DMatrix::from_row_slice(n_rows, 9, a);

    // Pad underdetermined systems so the SVD yields all 9 right singular vectors.
    if n_rows < 9 {
        let mut padded = DMatrix::zeros(9, 9);
        padded.view_mut((0, 0), (n_rows, 9)).copy_from(&matrix);
        matrix = padded;
    }

    let svd = matrix.svd(false, true);
    let v_t = svd.v_t?;
    let (min_idx, _) = svd
        .singular_values
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))?;
    let h = v_t.row(min_idx);

    Some(Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]))
}

/// Scales `H` so `H[(2,2)] = 1`; rejects non-finite and near-singular matrices.
pub fn normalize_homography(h: &Matrix3<f64>) -> Option<Matrix3<f64>> {
    let h = if h[(2, 2)].abs() > 1e-12 {
        h / h[(2, 2)]
    } else {
        *h
    };
    if h.iter().any(|v| !v.is_finite()) {
        return None;
    }
    let scale = h.iter().map(|v| v.abs()).fold(0.0, f64::max);
    if scale <= 0.0 || (h / scale).determinant().abs() < 1e-12 {
        return None;
    }
    Some(h)
}

/// Fits the homography that maps train keypoints onto query keypoints.
///
/// Fails with [`FeatureError::InsufficientMatches`] below `min_matches`, and
/// with [`FeatureError::DegenerateModel`] when no acceptable model is found.
pub fn estimate_homography(
    query: &KeyPoints,
    train: &KeyPoints,
    matches: &Matches,
    min_matches: usize,
    config: &RansacConfig,
) -> Result<HomographyFit> {
    if matches.len() < min_matches.max(MIN_HOMOGRAPHY_INLIERS) {
        return Err(FeatureError::InsufficientMatches {
            found: matches.len(),
            required: min_matches.max(MIN_HOMOGRAPHY_INLIERS),
        });
    }

    let data: Vec<MatchPair> = matches
        .iter()
        .map(|m| {
            let dst = query.keypoints.get(m.query_idx);
            let src = train.keypoints.get(m.train_idx);
            match (src, dst) {
                (Some(s), Some(d)) => Ok(MatchPair {
                    src: s.pt(),
                    dst: d.pt(),
                }),
                _ => Err(FeatureError::MatchingError(format!(
                    "match ({}, {}) indexes past the keypoint sets",
                    m.query_idx, m.train_idx
                ))),
            }
        })
        .collect::<Result<_>>()?;

    let result = Ransac::new(config.clone()).run(&HomographyEstimator, &data);
    let Some(model) = result.model else {
        return Err(FeatureError::DegenerateModel("no consensus model".into()));
    };
    if result.num_inliers < MIN_HOMOGRAPHY_INLIERS {
        return Err(FeatureError::DegenerateModel(format!(
            "only {} inliers support the model",
            result.num_inliers
        )));
    }
    let homography = normalize_homography(&model)
        .ok_or_else(|| FeatureError::DegenerateModel("near-singular or non-finite matrix".into()))?;

    Ok(HomographyFit {
        homography,
        inliers: result.inliers,
        num_inliers: result.num_inliers,
        residual: result.residual,
    })
}
