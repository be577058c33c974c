pub mod descriptor;
pub mod matcher;
pub mod ransac;
pub mod sift;

pub use descriptor::*;
pub use matcher::*;
pub use ransac::*;
pub use sift::*;

use image::{GrayImage, RgbImage};
use pano_core::KeyPoints;
use pano_imgproc::convert_rgb_to_gray;

pub type Result<T> = std::result::Result<T, FeatureError>;

#[derive(Debug, thiserror::Error)]
pub enum FeatureError {
    #[error("Detection error: {0}")]
    DetectionError(String),

    #[error("Matching error: {0}")]
    MatchingError(String),

    #[error("Image too small for feature detection: {width}x{height}")]
    ImageTooSmall { width: u32, height: u32 },

    #[error("Insufficient matches: found {found}, required {required}")]
    InsufficientMatches { found: usize, required: usize },

    #[error("Degenerate model: {0}")]
    DegenerateModel(String),
}

/// Why an image produced no usable features.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmptyReason {
    NoKeypoints,
    ImageTooSmall,
    DetectorFailed(String),
}

/// Result of feature extraction on one image.
#[derive(Debug, Clone)]
pub enum Features {
    Detected {
        keypoints: KeyPoints,
        descriptors: Descriptors,
    },
    Empty(EmptyReason),
}

impl Features {
    pub fn is_empty(&self) -> bool {
        matches!(self, Features::Empty(_))
    }

    pub fn num_keypoints(&self) -> usize {
        match self {
            Features::Detected { keypoints, .. } => keypoints.len(),
            Features::Empty(_) => 0,
        }
    }

    pub fn keypoints(&self) -> Option<&KeyPoints> {
        match self {
            Features::Detected { keypoints, .. } => Some(keypoints),
            Features::Empty(_) => None,
        }
    }

    pub fn descriptors(&self) -> Option<&Descriptors> {
        match self {
            Features::Detected { descriptors, .. } => Some(descriptors),
            Features::Empty(_) => None,
        }
    }
}

/// Extracts at most `max_features` SIFT features from a colour image.
pub fn detect_and_compute(image: &RgbImage, max_features: usize) -> Features {
    detect_and_compute_gray(&convert_rgb_to_gray(image), max_features)
}

/// Grayscale variant of [`detect_and_compute`]. Never fails: detector errors
/// become [`Features::Empty`].
pub fn detect_and_compute_gray(gray: &GrayImage, max_features: usize) -> Features {
    let sift = Sift::new().with_n_features(max_features);
    extract_with(&sift, gray)
}

/// Runs any [`FeatureDetector`] and folds its outcome into [`Features`].
pub fn extract_with(detector: &dyn FeatureDetector, gray: &GrayImage) -> Features {
    match detector.detect_and_compute(gray) {
        Ok((keypoints, _)) if keypoints.is_empty() => Features::Empty(EmptyReason::NoKeypoints),
        Ok((keypoints, descriptors)) => {
            tracing::trace!(keypoints = keypoints.len(), "features extracted");
            Features::Detected {
                keypoints,
                descriptors,
            }
        }
        Err(FeatureError::ImageTooSmall { .. }) => Features::Empty(EmptyReason::ImageTooSmall),
        Err(e) => Features::Empty(EmptyReason::DetectorFailed(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb};

    struct Failing;

    impl FeatureDetector for Failing {
        fn detect_and_compute(&self, _gray: &GrayImage) -> Result<(KeyPoints, Descriptors)> {
            Err(FeatureError::DetectionError("boom".into()))
        }
    }

    #[test]
    fn uniform_image_is_empty() {
        let img = RgbImage::from_pixel(64, 64, Rgb([120, 60, 30]));
        assert!(matches!(
            detect_and_compute(&img, 5000),
            Features::Empty(EmptyReason::NoKeypoints)
        ));
    }

    #[test]
    fn tiny_image_is_too_small() {
        let img = RgbImage::new(3, 3);
        assert!(matches!(
            detect_and_compute(&img, 5000),
            Features::Empty(EmptyReason::ImageTooSmall)
        ));
    }

    #[test]
    fn detector_failure_is_absorbed() {
        let gray = GrayImage::from_pixel(32, 32, Luma([0]));
        match extract_with(&Failing, &gray) {
            Features::Empty(EmptyReason::DetectorFailed(msg)) => assert!(msg.contains("boom")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
