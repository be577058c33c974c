//! Robust Estimation Module
//!
//! Provides a generic RANSAC implementation that can be used for any model estimation task.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::marker::PhantomData;

/// Configuration for robust estimation
#[derive(Debug, Clone)]
pub struct RobustConfig {
    /// Maximum error for a datum to count as an inlier.
    pub threshold: f64,
    pub max_iterations: usize,
    /// Probability that at least one all-inlier sample is drawn; drives the adaptive iteration count.
    pub confidence: f64,
    /// Fixed RNG seed; `None` draws from OS entropy.
    pub seed: Option<u64>,
}

impl Default for RobustConfig {
    fn default() -> Self {
        Self {
            threshold: 1.0,
            max_iterations: 1000,
            confidence: 0.99,
            seed: None,
        }
    }
}

/// Result of robust estimation
#[derive(Debug, Clone)]
pub struct RobustResult<M> {
    pub model: Option<M>,
    pub inliers: Vec<bool>,
    pub num_inliers: usize,
    pub residual: f64,
    pub iterations: usize,
}

impl<M> RobustResult<M> {
    fn empty(n: usize) -> Self {
        Self {
            model: None,
            inliers: vec![false; n],
            num_inliers: 0,
            residual: f64::INFINITY,
            iterations: 0,
        }
    }
}

/// Trait for models that can be estimated robustly
pub trait RobustModel<D> {
    type Model: Clone;

    /// Minimum number of data points required to estimate the model
    fn min_sample_size(&self) -> usize;

    /// Estimate model from a sample (minimal or larger)
    fn estimate(&self, data: &[&D]) -> Option<Self::Model>;

    /// Compute error for a single data point against the model
    fn compute_error(&self, model: &Self::Model, data: &D) -> f64;

    /// Rejects minimal samples that cannot produce a meaningful model.
    fn is_degenerate(&self, _sample: &[&D]) -> bool {
        false
    }
}

/// Generic RANSAC engine
pub struct Ransac<D, M: RobustModel<D>> {
    config: RobustConfig,
    _phantom: PhantomData<(D, M)>,
}

impl<D, M: RobustModel<D>> Ransac<D, M> {
    pub fn new(config: RobustConfig) -> Self {
        Self {
            config,
            _phantom: PhantomData,
        }
    }

    pub fn run(&self, estimator: &M, data: &[D]) -> RobustResult<M::Model> {
        let n = data.len();
        let k = estimator.min_sample_size();

        if n < k || k == 0 {
            return RobustResult::empty(n);
        }

        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut best = RobustResult::empty(n);
        let mut indices: Vec<usize> = (0..n).collect();
        let mut required_iterations = self.config.max_iterations;
        let mut iteration = 0;

        while iteration < required_iterations {
            iteration += 1;

            // 1. Sample
            let (picked, _) = indices.partial_shuffle(&mut rng, k);
            let sample: Vec<&D> = picked.iter().map(|&i| &data[i]).collect();
            if estimator.is_degenerate(&sample) {
                continue;
            }

            // 2. Estimate
            let Some(model) = estimator.estimate(&sample) else {
                continue;
            };

            // 3. Score
            let (inliers, num_inliers, residual) = self.score(estimator, &model, data);
            if num_inliers > best.num_inliers
                || (num_inliers == best.num_inliers && num_inliers > 0 && residual < best.residual)
            {
                best = RobustResult {
                    model: Some(model),
                    inliers,
                    num_inliers,
                    residual,
                    iterations: iteration,
                };
                required_iterations = required_iterations.min(adaptive_iterations(
                    self.config.confidence,
                    num_inliers as f64 / n as f64,
                    k,
                    self.config.max_iterations,
                ));
            }
        }

        best.iterations = iteration;
        if best.num_inliers < k {
            return best;
        }

        // 4. Refit on the consensus set
        let consensus: Vec<&D> = data
            .iter()
            .zip(best.inliers.iter())
            .filter(|(_, &inlier)| inlier)
            .map(|(d, _)| d)
            .collect();
        if let Some(refined) = estimator.estimate(&consensus) {
            let (inliers, num_inliers, residual) = self.score(estimator, &refined, data);
            if num_inliers >= best.num_inliers {
                best.model = Some(refined);
                best.inliers = inliers;
                best.num_inliers = num_inliers;
                best.residual = residual;
            }
        }

        best
    }

    fn score(&self, estimator: &M, model: &M::Model, data: &[D]) -> (Vec<bool>, usize, f64) {
        let mut inliers = vec![false; data.len()];
        let mut num_inliers = 0;
        let mut total_error = 0.0;

        for (j, d) in data.iter().enumerate() {
            let err = estimator.compute_error(model, d);
            if err < self.config.threshold {
                inliers[j] = true;
                num_inliers += 1;
                total_error += err;
            }
        }

        let residual = if num_inliers > 0 {
            total_error / num_inliers as f64
        } else {
            f64::INFINITY
        };
        (inliers, num_inliers, residual)
    }
}

/// Number of draws needed to hit an all-inlier sample with the given confidence.
fn adaptive_iterations(confidence: f64, inlier_ratio: f64, k: usize, max_iterations: usize) -> usize {
    let all_inlier = inlier_ratio.powi(k as i32);
    if all_inlier >= 1.0 - f64::EPSILON {
        return 1;
    }
    if all_inlier <= f64::EPSILON {
        return max_iterations;
    }
    let num = (1.0 - confidence).max(f64::MIN_POSITIVE).ln();
    let den = (1.0 - all_inlier).ln();
    let iterations = (num / den).ceil();
    if !iterations.is_finite() || iterations >= max_iterations as f64 {
        max_iterations
    } else {
        (iterations as usize).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fits y = a*x + b.
    struct LineModel;

    impl RobustModel<(f64, f64)> for LineModel {
        type Model = (f64, f64);

        fn min_sample_size(&self) -> usize {
            2
        }

        fn estimate(&self, data: &[&(f64, f64)]) -> Option<Self::Model> {
            let n = data.len() as f64;
            let sx: f64 = data.iter().map(|p| p.0).sum();
            let sy: f64 = data.iter().map(|p| p.1).sum();
            let sxx: f64 = data.iter().map(|p| p.0 * p.0).sum();
            let sxy: f64 = data.iter().map(|p| p.0 * p.1).sum();
            let det = n * sxx - sx * sx;
            if det.abs() < 1e-12 {
                return None;
            }
            let a = (n * sxy - sx * sy) / det;
            let b = (sy - a * sx) / n;
            Some((a, b))
        }

        fn compute_error(&self, model: &Self::Model, data: &(f64, f64)) -> f64 {
            (model.0 * data.0 + model.1 - data.1).abs()
        }
    }

    fn line_with_outliers() -> Vec<(f64, f64)> {
        let mut data: Vec<(f64, f64)> = (0..40).map(|i| (i as f64, 2.0 * i as f64 + 1.0)).collect();
        data.extend([(3.0, 90.0), (10.0, -40.0), (25.0, 5.0), (30.0, 300.0)]);
        data
    }

    #[test]
    fn ransac_recovers_line_and_rejects_outliers() {
        let config = RobustConfig {
            threshold: 0.5,
            seed: Some(7),
            ..Default::default()
        };
        let result = Ransac::new(config).run(&LineModel, &line_with_outliers());
        let (a, b) = result.model.unwrap();
        assert!((a - 2.0).abs() < 1e-9);
        assert!((b - 1.0).abs() < 1e-9);
        assert_eq!(result.num_inliers, 40);
        assert!(!result.inliers[40..].iter().any(|&i| i));
    }

    #[test]
    fn ransac_too_few_points_returns_no_model() {
        let result = Ransac::new(RobustConfig::default()).run(&LineModel, &[(1.0, 1.0)]);
        assert!(result.model.is_none());
        assert_eq!(result.inliers, vec![false]);
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let config = RobustConfig {
            threshold: 0.5,
            seed: Some(42),
            ..Default::default()
        };
        let data = line_with_outliers();
        let a = Ransac::new(config.clone()).run(&LineModel, &data);
        let b = Ransac::new(config).run(&LineModel, &data);
        assert_eq!(a.inliers, b.inliers);
        assert_eq!(a.iterations, b.iterations);
    }

    #[test]
    fn adaptive_iterations_shrink_with_inlier_ratio() {
        let low = adaptive_iterations(0.99, 0.3, 4, 5000);
        let high = adaptive_iterations(0.99, 0.9, 4, 5000);
        assert!(high < low);
        assert_eq!(adaptive_iterations(0.99, 1.0, 4, 5000), 1);
        assert_eq!(adaptive_iterations(0.99, 0.0, 4, 5000), 5000);
    }
}
