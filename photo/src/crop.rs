use image::RgbImage;
use pano_imgproc::{convert_rgb_to_gray, crop_rgb, foreground_bounds};

/// Crops to the bounding box of pixels whose luminance exceeds `threshold`.
///
/// An image with no such pixel is returned unchanged.
pub fn crop_black_border(img: &RgbImage, threshold: u8) -> RgbImage {
    let gray = convert_rgb_to_gray(img);
    match foreground_bounds(&gray, threshold) {
        Some(rect) => crop_rgb(img, rect).unwrap_or_else(|_| img.clone()),
        None => img.clone(),
    }
}
