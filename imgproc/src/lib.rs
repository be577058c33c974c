pub mod color;
pub mod convolve;
pub mod float_image;
pub mod geometry;
pub mod resize;
pub mod threshold;

pub use color::*;
pub use convolve::*;
pub use float_image::*;
pub use geometry::*;
pub use resize::*;
pub use threshold::*;

pub type Result<T> = std::result::Result<T, ImgprocError>;

#[derive(Debug, thiserror::Error)]
pub enum ImgprocError {
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),
}
