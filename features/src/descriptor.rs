use crate::Result;
use image::GrayImage;
pub use pano_core::{Descriptor, Descriptors};
use pano_core::KeyPoints;

/// A detector that produces keypoints together with their float descriptors.
pub trait FeatureDetector: Send + Sync {
    fn detect_and_compute(&self, gray: &GrayImage) -> Result<(KeyPoints, Descriptors)>;
}
