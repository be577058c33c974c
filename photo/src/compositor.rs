//! Perspective warp of the new image into a shared canvas.

use crate::{Result, StitchError};
use image::RgbImage;
use nalgebra::{Matrix3, Point2};
use pano_imgproc::{get_translation_matrix, image_corners, overlay_rgb, perspective_transform, warp_perspective_rgb, BorderMode};

/// Placement of both images on the output canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct CanvasLayout {
    pub width: u32,
    pub height: u32,
    /// Offset of image 1's origin inside the canvas.
    pub offset: (i64, i64),
    /// Image-2 to canvas transform, translation included.
    pub homography: Matrix3<f64>,
}

/// Bounding box of image 1 and the projected corners of image 2.
///
/// `dims` are `(width, height)`; `homography` maps image-2 points into image 1.
pub fn canvas_layout(
    dims1: (u32, u32),
    dims2: (u32, u32),
    homography: &Matrix3<f64>,
    max_dim: u32,
) -> Result<CanvasLayout> {
    let projected = perspective_transform(&image_corners(dims2.0, dims2.1), homography)
        .ok_or_else(|| StitchError::DegenerateHomography("image corner maps to infinity".into()))?;

    let all: Vec<Point2<f64>> = image_corners(dims1.0, dims1.1).into_iter().chain(projected).collect();
    let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
    let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for p in &all {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    if ![min_x, min_y, max_x, max_y].iter().all(|v| v.is_finite()) {
        return Err(StitchError::DegenerateHomography("non-finite canvas bounds".into()));
    }

    // Truncation toward zero on both ends.
    let x_min = (min_x - 0.5) as i64;
    let y_min = (min_y - 0.5) as i64;
    let x_max = (max_x + 0.5) as i64;
    let y_max = (max_y + 0.5) as i64;
    let width = x_max.saturating_sub(x_min);
    let height = y_max.saturating_sub(y_min);

    if width > max_dim as i64 || height > max_dim as i64 {
        return Err(StitchError::CanvasTooLarge {
            width: width.max(0) as u64,
            height: height.max(0) as u64,
            limit: max_dim,
        });
    }
    if width <= 0 || height <= 0 {
        return Err(StitchError::DegenerateHomography(format!("empty canvas {width}x{height}")));
    }

    let offset = (-x_min, -y_min);
    Ok(CanvasLayout {
        width: width as u32,
        height: height as u32,
        offset,
        homography: get_translation_matrix(offset.0 as f64, offset.1 as f64) * homography,
    })
}

/// Warps `image2` into image 1's frame and pastes `image1` over it unblended.
pub fn warp_and_composite(
    image1: &RgbImage,
    image2: &RgbImage,
    homography: &Matrix3<f64>,
    max_dim: u32,
) -> Result<RgbImage> {
    let layout = canvas_layout(image1.dimensions(), image2.dimensions(), homography, max_dim)?;
    let inverse = layout
        .homography
        .try_inverse()
        .ok_or_else(|| StitchError::DegenerateHomography("homography is not invertible".into()))?;

    let mut canvas = warp_perspective_rgb(image2, &inverse, layout.width, layout.height, BorderMode::Constant(0));
    overlay_rgb(&mut canvas, image1, layout.offset.0, layout.offset.1);
    Ok(canvas)
}
