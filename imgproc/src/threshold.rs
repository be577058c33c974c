use image::GrayImage;
use pano_core::Rect;
use rayon::prelude::*;

/// Bounding box of every pixel strictly brighter than `thresh`, or `None`
/// when no such pixel exists.
pub fn foreground_bounds(src: &GrayImage, thresh: u8) -> Option<Rect> {
    let width = src.width() as usize;
    if width == 0 {
        return None;
    }

    // Per row: first and last foreground column.
    let row_spans: Vec<Option<(usize, usize)>> = src
        .as_raw()
        .par_chunks(width)
        .map(|row| {
            let first = row.iter().position(|&v| v > thresh)?;
            let last = row.iter().rposition(|&v| v > thresh)?;
            Some((first, last))
        })
        .collect();

    let top = row_spans.iter().position(Option::is_some)?;
    let bottom = row_spans.iter().rposition(Option::is_some)?;
    let (min_x, max_x) = row_spans[top..=bottom]
        .iter()
        .flatten()
        .fold((usize::MAX, 0), |(lo, hi), &(a, b)| (lo.min(a), hi.max(b)));

    Some(Rect::new(
        min_x as i64,
        top as i64,
        (max_x - min_x + 1) as u32,
        (bottom - top + 1) as u32,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn bounds_of_single_block() {
        let mut img = GrayImage::new(20, 15);
        for y in 4..9 {
            for x in 3..12 {
                img.put_pixel(x, y, Luma([200]));
            }
        }
        assert_eq!(foreground_bounds(&img, 10), Some(Rect::new(3, 4, 9, 5)));
    }

    #[test]
    fn bounds_span_disjoint_pixels() {
        let mut img = GrayImage::new(10, 10);
        img.put_pixel(8, 1, Luma([50]));
        img.put_pixel(2, 7, Luma([50]));
        assert_eq!(foreground_bounds(&img, 10), Some(Rect::new(2, 1, 7, 7)));
    }

    #[test]
    fn dark_image_has_no_bounds() {
        let img = GrayImage::from_pixel(6, 6, Luma([10]));
        assert_eq!(foreground_bounds(&img, 10), None);
    }
}
