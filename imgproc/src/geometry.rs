use crate::{BorderMode, ImgprocError, Result};
use image::RgbImage;
use nalgebra::{Matrix3, Point2};
use pano_core::Rect;
use rayon::prelude::*;

/// Applies a projective transform to one point.
///
/// Returns `None` when the point maps to infinity.
pub fn transform_point(matrix: &Matrix3<f64>, pt: &Point2<f64>) -> Option<Point2<f64>> {
    let x = pt.x;
    let y = pt.y;

    let w = matrix[(2, 0)] * x + matrix[(2, 1)] * y + matrix[(2, 2)];
    if w.abs() <= 1e-12 {
        return None;
    }

    let out = Point2::new(
        (matrix[(0, 0)] * x + matrix[(0, 1)] * y + matrix[(0, 2)]) / w,
        (matrix[(1, 0)] * x + matrix[(1, 1)] * y + matrix[(1, 2)]) / w,
    );
    (out.x.is_finite() && out.y.is_finite()).then_some(out)
}

/// Transforms every point; `None` if any of them maps to infinity.
pub fn perspective_transform(points: &[Point2<f64>], matrix: &Matrix3<f64>) -> Option<Vec<Point2<f64>>> {
    points.iter().map(|p| transform_point(matrix, p)).collect()
}

/// Corners of a `width` x `height` image in (0,0), (0,h), (w,h), (w,0) order.
pub fn image_corners(width: u32, height: u32) -> [Point2<f64>; 4] {
    let w = width as f64;
    let h = height as f64;
    [
        Point2::new(0.0, 0.0),
        Point2::new(0.0, h),
        Point2::new(w, h),
        Point2::new(w, 0.0),
    ]
}

pub fn get_translation_matrix(dx: f64, dy: f64) -> Matrix3<f64> {
    Matrix3::new(1.0, 0.0, dx, 0.0, 1.0, dy, 0.0, 0.0, 1.0)
}

fn sample_rgb(img: &RgbImage, x: isize, y: isize, border: BorderMode) -> [f32; 3] {
    let (w, h) = (img.width() as usize, img.height() as usize);
    let mapped = (
        crate::convolve::map_coord(x, w, border),
        crate::convolve::map_coord(y, h, border),
    );
    match mapped {
        (Some(ix), Some(iy)) => {
            let p = img.get_pixel(ix as u32, iy as u32);
            [p[0] as f32, p[1] as f32, p[2] as f32]
        }
        _ => match border {
            BorderMode::Constant(v) => [v as f32; 3],
            BorderMode::Reflect101 => [0.0; 3],
        },
    }
}

fn get_pixel_bilinear_rgb(img: &RgbImage, x: f64, y: f64, border: BorderMode) -> [f32; 3] {
    let x0 = x.floor() as isize;
    let y0 = y.floor() as isize;
    let fx = (x - x0 as f64) as f32;
    let fy = (y - y0 as f64) as f32;

    let v00 = sample_rgb(img, x0, y0, border);
    let v10 = sample_rgb(img, x0 + 1, y0, border);
    let v01 = sample_rgb(img, x0, y0 + 1, border);
    let v11 = sample_rgb(img, x0 + 1, y0 + 1, border);

    let mut out = [0.0f32; 3];
    for c in 0..3 {
        let v0 = v00[c] * (1.0 - fx) + v10[c] * fx;
        let v1 = v01[c] * (1.0 - fx) + v11[c] * fx;
        out[c] = v0 * (1.0 - fy) + v1 * fy;
    }
    out
}

/// Warps `src` into a `width` x `height` canvas.
///
/// `inverse` maps destination pixel coordinates back into `src`; destination
/// pixels that land outside `src` take the constant border colour.
pub fn warp_perspective_rgb(
    src: &RgbImage,
    inverse: &Matrix3<f64>,
    width: u32,
    height: u32,
    border: BorderMode,
) -> RgbImage {
    let mut dst = RgbImage::new(width, height);
    if width == 0 || height == 0 {
        return dst;
    }
    let (sw, sh) = (src.width() as f64, src.height() as f64);

    dst.as_mut()
        .par_chunks_mut(width as usize * 3)
        .enumerate()
        .for_each(|(y, row)| {
            for x in 0..width as usize {
                let pt = Point2::new(x as f64, y as f64);
                let Some(src_pt) = transform_point(inverse, &pt) else {
                    continue;
                };
                // Entirely outside the source: skip the four lookups.
                if matches!(border, BorderMode::Constant(0))
                    && (src_pt.x <= -1.0 || src_pt.y <= -1.0 || src_pt.x >= sw || src_pt.y >= sh)
                {
                    continue;
                }
                let v = get_pixel_bilinear_rgb(src, src_pt.x, src_pt.y, border);
                for c in 0..3 {
                    row[x * 3 + c] = v[c].round().clamp(0.0, 255.0) as u8;
                }
            }
        });

    dst
}

/// Copies `img` onto `canvas` with its top-left corner at `(x, y)`.
///
/// The part falling outside the canvas is dropped. Returns the written region.
pub fn overlay_rgb(canvas: &mut RgbImage, img: &RgbImage, x: i64, y: i64) -> Option<Rect> {
    let canvas_rect = Rect::full(canvas.width(), canvas.height());
    let placed = Rect::new(x, y, img.width(), img.height());
    let region = placed.intersect(&canvas_rect)?;

    let cw = canvas.width() as usize;
    let iw = img.width() as usize;
    let src_x0 = (region.x - x) as usize;
    let src_y0 = (region.y - y) as usize;
    let len = region.width as usize * 3;
    let dst_raw: &mut [u8] = canvas.as_mut();
    let src_raw = img.as_raw();

    for row in 0..region.height as usize {
        let dy = region.y as usize + row;
        let sy = src_y0 + row;
        let d_off = (dy * cw + region.x as usize) * 3;
        let s_off = (sy * iw + src_x0) * 3;
        dst_raw[d_off..d_off + len].copy_from_slice(&src_raw[s_off..s_off + len]);
    }

    Some(region)
}

/// Extracts `rect` from `img`; the rectangle must lie inside the image.
pub fn crop_rgb(img: &RgbImage, rect: Rect) -> Result<RgbImage> {
    if rect.is_empty() {
        return Err(ImgprocError::DimensionMismatch("crop rectangle is empty".into()));
    }
    if rect.x < 0 || rect.y < 0 || rect.right() > img.width() as i64 || rect.bottom() > img.height() as i64 {
        return Err(ImgprocError::DimensionMismatch(format!(
            "crop {:?} exceeds image {}x{}",
            rect,
            img.width(),
            img.height()
        )));
    }
    Ok(image::imageops::crop_imm(img, rect.x as u32, rect.y as u32, rect.width, rect.height).to_image())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn gradient(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| Rgb([(x * 10) as u8, (y * 10) as u8, 77]))
    }

    #[test]
    fn transform_point_translation() {
        let t = get_translation_matrix(5.0, -2.0);
        let p = transform_point(&t, &Point2::new(1.0, 1.0)).unwrap();
        assert_eq!(p, Point2::new(6.0, -1.0));
    }

    #[test]
    fn transform_point_at_infinity_is_none() {
        let m = Matrix3::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0);
        assert!(transform_point(&m, &Point2::new(0.0, 3.0)).is_none());
    }

    #[test]
    fn warp_identity_keeps_pixels() {
        let img = gradient(8, 6);
        let out = warp_perspective_rgb(&img, &Matrix3::identity(), 8, 6, BorderMode::Constant(0));
        assert_eq!(out, img);
    }

    #[test]
    fn warp_translation_shifts_content() {
        let img = gradient(8, 6);
        // dst(x, y) = src(x - 3, y - 2)
        let inverse = get_translation_matrix(-3.0, -2.0);
        let out = warp_perspective_rgb(&img, &inverse, 12, 10, BorderMode::Constant(0));
        assert_eq!(out.get_pixel(3, 2), img.get_pixel(0, 0));
        assert_eq!(out.get_pixel(10, 7), img.get_pixel(7, 5));
        assert_eq!(out.get_pixel(0, 0).0, [0, 0, 0]);
        assert_eq!(out.get_pixel(11, 9).0, [0, 0, 0]);
    }

    #[test]
    fn overlay_clips_to_canvas() {
        let mut canvas = RgbImage::new(10, 10);
        let patch = RgbImage::from_pixel(4, 4, Rgb([200, 100, 50]));
        let region = overlay_rgb(&mut canvas, &patch, 8, -2).unwrap();
        assert_eq!(region, Rect::new(8, 0, 2, 2));
        assert_eq!(canvas.get_pixel(9, 1).0, [200, 100, 50]);
        assert_eq!(canvas.get_pixel(7, 1).0, [0, 0, 0]);
        assert_eq!(canvas.get_pixel(9, 2).0, [0, 0, 0]);
    }

    #[test]
    fn overlay_fully_outside_writes_nothing() {
        let mut canvas = RgbImage::new(5, 5);
        let patch = RgbImage::from_pixel(2, 2, Rgb([1, 2, 3]));
        assert!(overlay_rgb(&mut canvas, &patch, 5, 0).is_none());
        assert!(canvas.pixels().all(|p| p.0 == [0, 0, 0]));
    }

    #[test]
    fn crop_validates_bounds() {
        let img = gradient(10, 8);
        let cropped = crop_rgb(&img, Rect::new(2, 3, 4, 5)).unwrap();
        assert_eq!(cropped.dimensions(), (4, 5));
        assert_eq!(cropped.get_pixel(0, 0), img.get_pixel(2, 3));
        assert!(crop_rgb(&img, Rect::new(8, 0, 4, 4)).is_err());
        assert!(crop_rgb(&img, Rect::new(0, 0, 0, 4)).is_err());
    }
}
