use crate::FloatImage;
use rayon::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorderMode {
    Constant(u8),
    Reflect101,
}

pub fn gaussian_kernel_1d(sigma: f32, size: usize) -> Vec<f32> {
    assert!(size % 2 == 1, "gaussian kernel size must be odd");
    let mut kernel = Vec::with_capacity(size);
    let center = (size / 2) as isize;
    let sigma2 = sigma * sigma;
    let mut sum = 0.0f32;

    for i in 0..size {
        let x = (i as isize - center) as f32;
        let v = (-(x * x) / (2.0 * sigma2)).exp();
        kernel.push(v);
        sum += v;
    }

    if sum != 0.0 {
        for v in &mut kernel {
            *v /= sum;
        }
    }

    kernel
}

/// Odd kernel size covering +/- 4 sigma.
pub fn gaussian_kernel_size(sigma: f32) -> usize {
    let radius = (4.0 * sigma).ceil().max(1.0) as usize;
    2 * radius + 1
}

pub(crate) fn map_coord(coord: isize, len: usize, mode: BorderMode) -> Option<usize> {
    let n = len as isize;
    if n <= 0 {
        return None;
    }

    match mode {
        BorderMode::Constant(_) => {
            if coord < 0 || coord >= n {
                None
            } else {
                Some(coord as usize)
            }
        }
        BorderMode::Reflect101 => {
            if n == 1 {
                return Some(0);
            }
            let period = 2 * n - 2;
            let mut c = coord % period;
            if c < 0 {
                c += period;
            }
            if c >= n {
                c = period - c;
            }
            Some(c as usize)
        }
    }
}

fn border_value(border: BorderMode) -> f32 {
    match border {
        BorderMode::Constant(v) => v as f32 / 255.0,
        BorderMode::Reflect101 => 0.0,
    }
}

/// Convolves rows then columns with the same 1-D kernel.
pub fn separable_convolve_f32(image: &FloatImage, kernel_1d: &[f32], border: BorderMode) -> FloatImage {
    let (w, h) = (image.width, image.height);
    if image.is_empty() {
        return image.clone();
    }
    let radius = (kernel_1d.len() / 2) as isize;
    let fill = border_value(border);

    let mut tmp = FloatImage::new(w, h);
    tmp.data
        .par_chunks_mut(w)
        .zip(image.data.par_chunks(w))
        .for_each(|(out_row, in_row)| {
            for (x, out) in out_row.iter_mut().enumerate() {
                let mut acc = 0.0f32;
                for (k, &kv) in kernel_1d.iter().enumerate() {
                    let sx = x as isize + k as isize - radius;
                    let v = match map_coord(sx, w, border) {
                        Some(ix) => in_row[ix],
                        None => fill,
                    };
                    acc += kv * v;
                }
                *out = acc;
            }
        });

    let mut dst = FloatImage::new(w, h);
    dst.data
        .par_chunks_mut(w)
        .enumerate()
        .for_each(|(y, out_row)| {
            for (k, &kv) in kernel_1d.iter().enumerate() {
                let sy = y as isize + k as isize - radius;
                match map_coord(sy, h, border) {
                    Some(iy) => {
                        let src_row = &tmp.data[iy * w..(iy + 1) * w];
                        for (out, &v) in out_row.iter_mut().zip(src_row) {
                            *out += kv * v;
                        }
                    }
                    None => {
                        for out in out_row.iter_mut() {
                            *out += kv * fill;
                        }
                    }
                }
            }
        });

    dst
}

/// Gaussian blur with mirrored borders (`gfedcb|abcdefgh|gfedcba`).
pub fn gaussian_blur_f32(image: &FloatImage, sigma: f32) -> FloatImage {
    if sigma <= 0.0 {
        return image.clone();
    }
    let kernel = gaussian_kernel_1d(sigma, gaussian_kernel_size(sigma));
    separable_convolve_f32(image, &kernel, BorderMode::Reflect101)
}
