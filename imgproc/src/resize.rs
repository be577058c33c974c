use crate::FloatImage;
use image::imageops::{self, FilterType};
use image::RgbImage;
use rayon::prelude::*;

/// Scales `src` so its width equals `max_width`, keeping the aspect ratio.
/// Images already narrow enough are returned as-is.
pub fn limit_width(src: &RgbImage, max_width: u32) -> RgbImage {
    if max_width == 0 || src.width() <= max_width {
        return src.clone();
    }
    let scale = max_width as f64 / src.width() as f64;
    let height = ((src.height() as f64 * scale) as u32).max(1);
    imageops::resize(src, max_width, height, FilterType::Triangle)
}

/// Halves both dimensions by keeping every second pixel.
pub fn downsample_half_f32(src: &FloatImage) -> FloatImage {
    let width = src.width / 2;
    let height = src.height / 2;
    let mut dst = FloatImage::new(width, height);
    if width == 0 || height == 0 {
        return dst;
    }

    dst.data
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, row)| {
            let src_row = &src.data[2 * y * src.width..];
            for (x, out) in row.iter_mut().enumerate() {
                *out = src_row[2 * x];
            }
        });

    dst
}

/// Doubles both dimensions with bilinear interpolation (pixel-centre aligned).
pub fn upsample_double_f32(src: &FloatImage) -> FloatImage {
    let width = src.width * 2;
    let height = src.height * 2;
    let mut dst = FloatImage::new(width, height);
    if src.is_empty() {
        return dst;
    }
    let max_x = (src.width - 1) as f32;
    let max_y = (src.height - 1) as f32;

    dst.data
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, row)| {
            let fy = ((y as f32 + 0.5) * 0.5 - 0.5).clamp(0.0, max_y);
            let y0 = fy as usize;
            let y1 = (y0 + 1).min(src.height - 1);
            let dy = fy - y0 as f32;

            for (x, out) in row.iter_mut().enumerate() {
                let fx = ((x as f32 + 0.5) * 0.5 - 0.5).clamp(0.0, max_x);
                let x0 = fx as usize;
                let x1 = (x0 + 1).min(src.width - 1);
                let dx = fx - x0 as f32;

                let v0 = src.get(x0, y0) * (1.0 - dx) + src.get(x1, y0) * dx;
                let v1 = src.get(x0, y1) * (1.0 - dx) + src.get(x1, y1) * dx;
                *out = v0 * (1.0 - dy) + v1 * dy;
            }
        });

    dst
}
