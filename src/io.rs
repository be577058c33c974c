//! Image loading, width normalisation and saving.

use image::{ImageResult, RgbImage};
use pano_imgproc::limit_width;
use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// Default width cap applied before stitching.
pub const DEFAULT_MAX_WIDTH: u32 = 800;

/// Decodes every path into an RGB image, in order.
///
/// Paths that are missing or fail to decode are skipped with a warning.
pub fn load_images<P: AsRef<Path>>(paths: &[P]) -> Vec<RgbImage> {
    paths
        .iter()
        .filter_map(|path| {
            let path = path.as_ref();
            if !path.exists() {
                tracing::warn!(path = %path.display(), "image not found, skipping");
                return None;
            }
            match image::open(path) {
                Ok(img) => {
                    let rgb = img.to_rgb8();
                    tracing::debug!(path = %path.display(), width = rgb.width(), height = rgb.height(), "image loaded");
                    Some(rgb)
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to decode image, skipping");
                    None
                }
            }
        })
        .collect()
}

/// Scales images wider than `max_width` down to exactly that width.
pub fn resize_to_max_width(images: &[RgbImage], max_width: u32) -> Vec<RgbImage> {
    images.par_iter().map(|img| limit_width(img, max_width)).collect()
}

/// Encodes `image` in the format implied by the path's extension.
pub fn save_image(image: &RgbImage, path: impl AsRef<Path>) -> ImageResult<()> {
    image.save(path.as_ref())
}

/// Expands directory arguments into their image files, sorted by name.
pub fn collect_image_paths(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut out = Vec::new();
    for input in inputs {
        if !input.is_dir() {
            out.push(input.clone());
            continue;
        }
        let Ok(entries) = std::fs::read_dir(input) else {
            tracing::warn!(path = %input.display(), "cannot read directory, skipping");
            continue;
        };
        let mut files: Vec<PathBuf> = entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| has_image_extension(p))
            .collect();
        files.sort();
        out.extend(files);
    }
    out
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_ascii_lowercase().as_str(), "jpg" | "jpeg" | "png" | "bmp" | "tif" | "tiff"))
        .unwrap_or(false)
}
