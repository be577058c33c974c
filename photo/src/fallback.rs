//! Edge-to-edge concatenation used when no geometry is recovered.

use crate::config::VerticalPlacement;
use crate::Result;
use image::RgbImage;
use pano_core::Rect;
use pano_imgproc::{crop_rgb, overlay_rgb};
use std::borrow::Cow;

/// Centre crop of `img` down to `height` rows.
fn crop_height(img: &RgbImage, height: u32) -> Result<RgbImage> {
    let y = (img.height() - height) / 2;
    Ok(crop_rgb(img, Rect::new(0, y as i64, img.width(), height))?)
}

/// Centre crop of `img` down to `width` columns.
fn crop_width(img: &RgbImage, width: u32) -> Result<RgbImage> {
    let x = (img.width() - width) / 2;
    Ok(crop_rgb(img, Rect::new(x as i64, 0, width, img.height()))?)
}

/// Crops the larger of two extents to the smaller when they differ by more than `max_difference`.
fn equalize<'a>(
    a: &'a RgbImage,
    b: &'a RgbImage,
    extent: fn(&RgbImage) -> u32,
    crop: fn(&RgbImage, u32) -> Result<RgbImage>,
    max_difference: u32,
) -> Result<(Cow<'a, RgbImage>, Cow<'a, RgbImage>)> {
    let (ea, eb) = (extent(a), extent(b));
    if ea.abs_diff(eb) <= max_difference || ea.min(eb) == 0 {
        return Ok((Cow::Borrowed(a), Cow::Borrowed(b)));
    }
    if ea > eb {
        Ok((Cow::Owned(crop(a, eb)?), Cow::Borrowed(b)))
    } else {
        Ok((Cow::Borrowed(a), Cow::Owned(crop(b, ea)?)))
    }
}

/// `image1` on the left, `image2` on the right, both top-aligned.
pub fn concat_horizontal(image1: &RgbImage, image2: &RgbImage, max_height_difference: u32) -> Result<RgbImage> {
    let (left, right) = equalize(image1, image2, RgbImage::height, crop_height, max_height_difference)?;
    let mut canvas = RgbImage::new(left.width() + right.width(), left.height().max(right.height()));
    overlay_rgb(&mut canvas, &left, 0, 0);
    overlay_rgb(&mut canvas, &right, left.width() as i64, 0);
    Ok(canvas)
}

/// Stacks `image2` above or below `image1`, both left-aligned.
pub fn concat_vertical(
    image1: &RgbImage,
    image2: &RgbImage,
    placement: VerticalPlacement,
    max_width_difference: u32,
) -> Result<RgbImage> {
    let (first, second) = equalize(image1, image2, RgbImage::width, crop_width, max_width_difference)?;
    let (top, bottom) = match placement {
        VerticalPlacement::Above => (second, first),
        VerticalPlacement::Below => (first, second),
    };
    let mut canvas = RgbImage::new(top.width().max(bottom.width()), top.height() + bottom.height());
    overlay_rgb(&mut canvas, &top, 0, 0);
    overlay_rgb(&mut canvas, &bottom, 0, top.height() as i64);
    Ok(canvas)
}
