use image::{GrayImage, RgbImage};
use rayon::prelude::*;

// BT.601 weights (0.299, 0.587, 0.114) in 14-bit fixed point.
const W_R: u32 = 4899;
const W_G: u32 = 9617;
const W_B: u32 = 1868;
const SHIFT: u32 = 14;

/// Luma of one RGB pixel, rounded to nearest.
#[inline]
pub fn luminance(rgb: [u8; 3]) -> u8 {
    let y = rgb[0] as u32 * W_R + rgb[1] as u32 * W_G + rgb[2] as u32 * W_B + (1 << (SHIFT - 1));
    (y >> SHIFT) as u8
}

/// BT.601 luma of every pixel, one row per rayon task.
pub fn convert_rgb_to_gray(rgb: &RgbImage) -> GrayImage {
    let (w, h) = rgb.dimensions();
    let mut gray = GrayImage::new(w, h);
    if w == 0 || h == 0 {
        return gray;
    }

    gray.as_mut()
        .par_chunks_mut(w as usize)
        .zip(rgb.as_raw().par_chunks(w as usize * 3))
        .for_each(|(g_row, rgb_row)| {
            for (g, px) in g_row.iter_mut().zip(rgb_row.chunks_exact(3)) {
                *g = luminance([px[0], px[1], px[2]]);
            }
        });

    gray
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn luminance_weights() {
        assert_eq!(luminance([0, 0, 0]), 0);
        assert_eq!(luminance([255, 255, 255]), 255);
        // 0.299*100 + 0.587*150 + 0.114*200 = 140.75
        assert_eq!(luminance([100, 150, 200]), 141);
    }

    #[test]
    fn gray_conversion_is_per_pixel_luminance() {
        let rgb = RgbImage::from_pixel(7, 5, Rgb([100, 150, 200]));
        let gray = convert_rgb_to_gray(&rgb);
        assert_eq!(gray.dimensions(), (7, 5));
        assert!(gray.pixels().all(|p| p[0] == 141));
    }

    #[test]
    fn empty_image_converts_to_empty() {
        let gray = convert_rgb_to_gray(&RgbImage::new(0, 0));
        assert_eq!(gray.dimensions(), (0, 0));
    }
}
