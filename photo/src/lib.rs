//! Pairwise panorama stitching
//!
//! Reduces an ordered image list into one canvas. Each merge analyses the
//! overlap between the running canvas and the next image, aligns them with a
//! robust homography when the overlap supports it, and otherwise concatenates
//! them edge to edge. The finished canvas is trimmed of its dark border.
//!
//! # Example
//!
//! ```no_run
//! # use pano_photo::{build_panorama, AxisMode, NullObserver, StitchConfig};
//! # use image::RgbImage;
//! let images = vec![RgbImage::new(640, 480), RgbImage::new(640, 480)];
//! let panorama = build_panorama(&images, AxisMode::Auto, &StitchConfig::default(), &NullObserver)?;
//! println!("{}x{} ({})", panorama.image.width(), panorama.image.height(), panorama.axis);
//! # Ok::<(), pano_photo::StitchError>(())
//! ```

pub mod compositor;
pub mod config;
pub mod crop;
pub mod direction;
pub mod fallback;
pub mod observer;
pub mod overlap;
pub mod stitcher;

pub use compositor::*;
pub use config::*;
pub use crop::*;
pub use direction::*;
pub use fallback::*;
pub use observer::*;
pub use overlap::*;
pub use stitcher::*;

use pano_features::FeatureError;
use pano_imgproc::ImgprocError;

pub type Result<T> = std::result::Result<T, StitchError>;

#[derive(Debug, thiserror::Error)]
pub enum StitchError {
    #[error("No features could be extracted from one of the images")]
    FeatureExtractionEmpty,

    #[error("Insufficient matches: found {found}, required {required}")]
    InsufficientMatches { found: usize, required: usize },

    #[error("Insufficient overlap: {fraction:.3} below {required:.3}")]
    InsufficientOverlap { fraction: f64, required: f64 },

    #[error("Degenerate homography: {0}")]
    DegenerateHomography(String),

    #[error("Canvas {width}x{height} exceeds the {limit} px limit")]
    CanvasTooLarge { width: u64, height: u64, limit: u32 },

    #[error("At least 2 images are required, got {found}")]
    InsufficientImages { found: usize },

    #[error(transparent)]
    Imgproc(#[from] ImgprocError),
}

impl From<FeatureError> for StitchError {
    fn from(err: FeatureError) -> Self {
        match err {
            FeatureError::InsufficientMatches { found, required } => {
                StitchError::InsufficientMatches { found, required }
            }
            FeatureError::DegenerateModel(reason) => StitchError::DegenerateHomography(reason),
            other => StitchError::DegenerateHomography(other.to_string()),
        }
    }
}
