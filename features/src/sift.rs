//! SIFT (Scale-Invariant Feature Transform)
//!
//! Keypoints are difference-of-Gaussian extrema refined to sub-pixel and
//! sub-scale accuracy, filtered by contrast and edge response, and assigned one
//! or more dominant orientations. Each keypoint is described by a 4x4 grid of
//! 8-bin gradient orientation histograms (128 values, unit L2 norm).

use crate::descriptor::FeatureDetector;
use crate::{FeatureError, Result};
use image::GrayImage;
use nalgebra::{Matrix3, Vector3};
use pano_core::{Descriptor, Descriptors, KeyPoint, KeyPoints};
use pano_imgproc::{downsample_half_f32, gaussian_blur_f32, upsample_double_f32, FloatImage};
use rayon::prelude::*;

const INIT_SIGMA: f32 = 0.5;
const IMG_BORDER: usize = 5;
const MIN_OCTAVE_DIM: usize = 2 * IMG_BORDER + 3;
const MAX_INTERP_STEPS: usize = 5;
const ORI_HIST_BINS: usize = 36;
const ORI_SIG_FCTR: f32 = 1.5;
const ORI_RADIUS: f32 = 3.0 * ORI_SIG_FCTR;
const ORI_PEAK_RATIO: f32 = 0.8;
const DESCR_WIDTH: usize = 4;
const DESCR_HIST_BINS: usize = 8;
const DESCR_SCL_FCTR: f32 = 3.0;
const DESCR_MAG_THR: f32 = 0.2;
const MIN_IMAGE_DIM: u32 = 8;

/// Length of every SIFT descriptor.
pub const DESCRIPTOR_SIZE: usize = DESCR_WIDTH * DESCR_WIDTH * DESCR_HIST_BINS;

#[derive(Debug, Clone)]
pub struct Sift {
    /// Keep at most this many keypoints (strongest response first); 0 keeps all.
    pub n_features: usize,
    pub n_layers: usize,
    pub sigma: f32,
    pub contrast_threshold: f32,
    pub edge_threshold: f32,
    /// Double the input before building the first octave.
    pub upscale: bool,
}

impl Default for Sift {
    fn default() -> Self {
        Self {
            n_features: 0,
            n_layers: 3,
            sigma: 1.6,
            contrast_threshold: 0.04,
            edge_threshold: 10.0,
            upscale: true,
        }
    }
}

/// A refined extremum, still expressed in its octave's pixel grid.
#[derive(Debug, Clone, Copy)]
struct ScalePoint {
    octave: usize,
    layer: usize,
    x: f32,
    y: f32,
    /// Scale relative to the octave.
    scale: f32,
    response: f32,
    angle: f32,
}

impl Sift {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_n_features(mut self, n: usize) -> Self {
        self.n_features = n;
        self
    }

    pub fn with_contrast_threshold(mut self, threshold: f32) -> Self {
        self.contrast_threshold = threshold;
        self
    }

    pub fn with_upscale(mut self, upscale: bool) -> Self {
        self.upscale = upscale;
        self
    }

    fn base_image(&self, gray: &GrayImage) -> FloatImage {
        let img = FloatImage::from_gray(gray);
        if self.upscale {
            let sig_diff = (self.sigma * self.sigma - 4.0 * INIT_SIGMA * INIT_SIGMA).max(0.01).sqrt();
            gaussian_blur_f32(&upsample_double_f32(&img), sig_diff)
        } else {
            let sig_diff = (self.sigma * self.sigma - INIT_SIGMA * INIT_SIGMA).max(0.01).sqrt();
            gaussian_blur_f32(&img, sig_diff)
        }
    }

    /// Octaves whose first layer still fits the extrema border.
    fn octave_count(&self, base: &FloatImage) -> usize {
        let min_dim = base.width.min(base.height);
        if min_dim < MIN_OCTAVE_DIM {
            return 1;
        }
        (min_dim / MIN_OCTAVE_DIM).ilog2() as usize + 1
    }

    /// Incremental blur applied to go from layer `i - 1` to layer `i`.
    fn layer_sigmas(&self) -> Vec<f32> {
        let s = self.n_layers;
        let k = 2.0f32.powf(1.0 / s as f32);
        let mut sigmas = vec![self.sigma; s + 3];
        for (i, sig) in sigmas.iter_mut().enumerate().skip(1) {
            let sig_prev = k.powi(i as i32 - 1) * self.sigma;
            let sig_total = sig_prev * k;
            *sig = (sig_total * sig_total - sig_prev * sig_prev).sqrt();
        }
        sigmas
    }

    /// Build SIFT Gaussian scale space: `n_layers + 3` images per octave.
    pub fn build_scale_space(&self, base: &FloatImage, n_octaves: usize) -> Vec<Vec<FloatImage>> {
        let sigmas = self.layer_sigmas();
        let mut pyramid: Vec<Vec<FloatImage>> = Vec::with_capacity(n_octaves);

        for octave in 0..n_octaves {
            let first = if octave == 0 {
                base.clone()
            } else {
                downsample_half_f32(&pyramid[octave - 1][self.n_layers])
            };
            if first.width < MIN_OCTAVE_DIM || first.height < MIN_OCTAVE_DIM {
                break;
            }

            let mut layers = Vec::with_capacity(self.n_layers + 3);
            layers.push(first);
            for sigma in sigmas.iter().skip(1) {
                let next = gaussian_blur_f32(&layers[layers.len() - 1], *sigma);
                layers.push(next);
            }
            pyramid.push(layers);
        }

        pyramid
    }

    /// Compute Difference of Gaussians (DoG)
    pub fn compute_dog(&self, gaussian_pyramid: &[Vec<FloatImage>]) -> Vec<Vec<FloatImage>> {
        gaussian_pyramid
            .iter()
            .map(|layers| layers.windows(2).map(|w| w[1].sub(&w[0])).collect())
            .collect()
    }

    fn find_scale_space_extrema(
        &self,
        gauss: &[Vec<FloatImage>],
        dog: &[Vec<FloatImage>],
    ) -> Vec<ScalePoint> {
        let s = self.n_layers;
        let threshold = 0.5 * self.contrast_threshold / s as f32;

        let jobs: Vec<(usize, usize)> = (0..dog.len())
            .flat_map(|o| (1..=s).map(move |i| (o, i)))
            .collect();

        jobs.par_iter()
            .flat_map_iter(|&(o, i)| {
                let mut found = Vec::new();
                let img = &dog[o][i];
                let (w, h) = (img.width, img.height);
                for r in IMG_BORDER..h - IMG_BORDER {
                    for c in IMG_BORDER..w - IMG_BORDER {
                        let val = img.get(c, r);
                        if val.abs() <= threshold || !is_extremum(&dog[o], i, c, r, val) {
                            continue;
                        }
                        let Some(point) = self.adjust_local_extremum(&dog[o], o, i, c, r) else {
                            continue;
                        };
                        let gauss_img = &gauss[o][point.layer];
                        for angle in orientation_peaks(gauss_img, &point) {
                            found.push(ScalePoint { angle, ..point });
                        }
                    }
                }
                found
            })
            .collect()
    }

    /// Iterative quadratic fit of the DoG around `(c, r, layer)`.
    fn adjust_local_extremum(
        &self,
        dog: &[FloatImage],
        octave: usize,
        layer: usize,
        c: usize,
        r: usize,
    ) -> Option<ScalePoint> {
        let s = self.n_layers as isize;
        let (w, h) = (dog[0].width as isize, dog[0].height as isize);
        let border = IMG_BORDER as isize;
        let (mut c, mut r, mut layer) = (c as isize, r as isize, layer as isize);
        let (mut xc, mut xr, mut xi) = (0.0f32, 0.0f32, 0.0f32);
        let mut converged = false;

        for _ in 0..MAX_INTERP_STEPS {
            let (grad, hess) = derivatives(dog, layer as usize, c as usize, r as usize);
            let solution = hess.lu().solve(&grad)?;
            xc = -solution[0];
            xr = -solution[1];
            xi = -solution[2];

            if xc.abs() < 0.5 && xr.abs() < 0.5 && xi.abs() < 0.5 {
                converged = true;
                break;
            }
            let limit = (i32::MAX / 3) as f32;
            if xc.abs() > limit || xr.abs() > limit || xi.abs() > limit {
                return None;
            }

            c += xc.round() as isize;
            r += xr.round() as isize;
            layer += xi.round() as isize;
            if layer < 1 || layer > s || c < border || c >= w - border || r < border || r >= h - border {
                return None;
            }
        }
        if !converged {
            return None;
        }

        let (cu, ru, lu) = (c as usize, r as usize, layer as usize);
        let (grad, hess) = derivatives(dog, lu, cu, ru);
        let t = grad[0] * xc + grad[1] * xr + grad[2] * xi;
        let contrast = dog[lu].get(cu, ru) + 0.5 * t;
        if contrast.abs() * (s as f32) < self.contrast_threshold {
            return None;
        }

        // Principal curvature ratio test on the 2x2 spatial Hessian.
        let (dxx, dyy, dxy) = (hess[(0, 0)], hess[(1, 1)], hess[(0, 1)]);
        let tr = dxx + dyy;
        let det = dxx * dyy - dxy * dxy;
        let edge = self.edge_threshold;
        if det <= 0.0 || tr * tr * edge >= (edge + 1.0) * (edge + 1.0) * det {
            return None;
        }

        Some(ScalePoint {
            octave,
            layer: lu,
            x: c as f32 + xc,
            y: r as f32 + xr,
            scale: self.sigma * 2.0f32.powf((layer as f32 + xi) / s as f32),
            response: contrast.abs(),
            angle: 0.0,
        })
    }

    /// Detects keypoints and computes their descriptors in one pass.
    pub fn detect_and_compute(&self, gray: &GrayImage) -> Result<(KeyPoints, Descriptors)> {
        if gray.width() < MIN_IMAGE_DIM || gray.height() < MIN_IMAGE_DIM {
            return Err(FeatureError::ImageTooSmall {
                width: gray.width(),
                height: gray.height(),
            });
        }
        if self.n_layers == 0 {
            return Err(FeatureError::DetectionError("n_layers must be positive".into()));
        }

        let base = self.base_image(gray);
        let n_octaves = self.octave_count(&base);
        let gauss = self.build_scale_space(&base, n_octaves);
        if gauss.is_empty() {
            return Err(FeatureError::ImageTooSmall {
                width: gray.width(),
                height: gray.height(),
            });
        }
        let dog = self.compute_dog(&gauss);

        let mut points = self.find_scale_space_extrema(&gauss, &dog);
        // Strongest first, then drop exact duplicates produced by overlapping layers.
        points.sort_by(|a, b| {
            b.response
                .partial_cmp(&a.response)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.octave.cmp(&b.octave))
                .then(a.x.total_cmp(&b.x))
                .then(a.y.total_cmp(&b.y))
                .then(a.angle.total_cmp(&b.angle))
        });
        points.dedup_by(|a, b| {
            a.octave == b.octave && a.x == b.x && a.y == b.y && a.scale == b.scale && a.angle == b.angle
        });
        if self.n_features > 0 {
            points.truncate(self.n_features);
        }

        let coord_scale = if self.upscale { 0.5 } else { 1.0 };
        let descriptors: Descriptors = points
            .par_iter()
            .map(|p| {
                let octave_scale = (1usize << p.octave) as f32 * coord_scale;
                let keypoint = KeyPoint::new((p.x * octave_scale) as f64, (p.y * octave_scale) as f64)
                    .with_size((p.scale * 2.0 * octave_scale) as f64)
                    .with_angle(p.angle as f64)
                    .with_response(p.response as f64)
                    .with_octave(p.octave as i32 - i32::from(self.upscale));
                let data = compute_descriptor(&gauss[p.octave][p.layer], p);
                Descriptor::new(data, keypoint)
            })
            .collect::<Vec<_>>()
            .into_iter()
            .collect();

        let keypoints: KeyPoints = descriptors.iter().map(|d| d.keypoint).collect();
        Ok((keypoints, descriptors))
    }
}

impl FeatureDetector for Sift {
    fn detect_and_compute(&self, gray: &GrayImage) -> Result<(KeyPoints, Descriptors)> {
        Sift::detect_and_compute(self, gray)
    }
}

fn is_extremum(dog: &[FloatImage], layer: usize, c: usize, r: usize, val: f32) -> bool {
    let is_max = val > 0.0;
    for img in &dog[layer - 1..=layer + 1] {
        for y in r - 1..=r + 1 {
            for x in c - 1..=c + 1 {
                let v = img.get(x, y);
                if is_max && v > val || !is_max && v < val {
                    return false;
                }
            }
        }
    }
    true
}

/// Gradient and Hessian of the DoG at `(c, r)` in `(x, y, scale)` order.
fn derivatives(dog: &[FloatImage], layer: usize, c: usize, r: usize) -> (Vector3<f32>, Matrix3<f32>) {
    let img = &dog[layer];
    let prev = &dog[layer - 1];
    let next = &dog[layer + 1];

    let v = img.get(c, r);
    let grad = Vector3::new(
        (img.get(c + 1, r) - img.get(c - 1, r)) * 0.5,
        (img.get(c, r + 1) - img.get(c, r - 1)) * 0.5,
        (next.get(c, r) - prev.get(c, r)) * 0.5,
    );

    let v2 = 2.0 * v;
    let dxx = img.get(c + 1, r) + img.get(c - 1, r) - v2;
    let dyy = img.get(c, r + 1) + img.get(c, r - 1) - v2;
    let dss = next.get(c, r) + prev.get(c, r) - v2;
    let dxy = (img.get(c + 1, r + 1) - img.get(c - 1, r + 1) - img.get(c + 1, r - 1)
        + img.get(c - 1, r - 1))
        * 0.25;
    let dxs = (next.get(c + 1, r) - next.get(c - 1, r) - prev.get(c + 1, r) + prev.get(c - 1, r)) * 0.25;
    let dys = (next.get(c, r + 1) - next.get(c, r - 1) - prev.get(c, r + 1) + prev.get(c, r - 1)) * 0.25;

    let hess = Matrix3::new(dxx, dxy, dxs, dxy, dyy, dys, dxs, dys, dss);
    (grad, hess)
}

/// Gradient magnitude and orientation (degrees in `[0, 360)`) at an interior pixel.
#[inline]
fn gradient_at(img: &FloatImage, x: usize, y: usize) -> (f32, f32) {
    let dx = img.get(x + 1, y) - img.get(x - 1, y);
    let dy = img.get(x, y - 1) - img.get(x, y + 1);
    let mut ori = dy.atan2(dx).to_degrees();
    if ori < 0.0 {
        ori += 360.0;
    }
    if ori >= 360.0 {
        ori -= 360.0;
    }
    ((dx * dx + dy * dy).sqrt(), ori)
}

/// Keypoint angles (degrees, keypoint convention) for every orientation
/// histogram peak within 80% of the maximum.
fn orientation_peaks(img: &FloatImage, point: &ScalePoint) -> Vec<f32> {
    let n = ORI_HIST_BINS;
    let sigma = ORI_SIG_FCTR * point.scale;
    let radius = (ORI_RADIUS * point.scale).round() as isize;
    let expf_scale = -1.0 / (2.0 * sigma * sigma);
    let (cx, cy) = (point.x.round() as isize, point.y.round() as isize);
    let (w, h) = (img.width as isize, img.height as isize);

    let mut raw = vec![0.0f32; n];
    for i in -radius..=radius {
        let y = cy + i;
        if y <= 0 || y >= h - 1 {
            continue;
        }
        for j in -radius..=radius {
            let x = cx + j;
            if x <= 0 || x >= w - 1 {
                continue;
            }
            let (mag, ori) = gradient_at(img, x as usize, y as usize);
            let weight = (((i * i + j * j) as f32) * expf_scale).exp();
            let mut bin = (ori * n as f32 / 360.0).round() as isize;
            if bin >= n as isize {
                bin -= n as isize;
            }
            if bin < 0 {
                bin += n as isize;
            }
            raw[bin as usize] += weight * mag;
        }
    }

    let at = |k: isize| raw[k.rem_euclid(n as isize) as usize];
    let hist: Vec<f32> = (0..n as isize)
        .map(|k| {
            (at(k - 2) + at(k + 2)) * (1.0 / 16.0) + (at(k - 1) + at(k + 1)) * (4.0 / 16.0) + at(k) * (6.0 / 16.0)
        })
        .collect();

    let max = hist.iter().cloned().fold(0.0f32, f32::max);
    if max <= 0.0 {
        return Vec::new();
    }
    let mag_thr = max * ORI_PEAK_RATIO;

    let mut angles = Vec::new();
    for j in 0..n {
        let l = if j > 0 { j - 1 } else { n - 1 };
        let r2 = if j < n - 1 { j + 1 } else { 0 };
        if hist[j] > hist[l] && hist[j] > hist[r2] && hist[j] >= mag_thr {
            let denom = hist[l] - 2.0 * hist[j] + hist[r2];
            let mut bin = j as f32 + 0.5 * (hist[l] - hist[r2]) / denom;
            if bin < 0.0 {
                bin += n as f32;
            } else if bin >= n as f32 {
                bin -= n as f32;
            }
            let mut angle = 360.0 - (360.0 / n as f32) * bin;
            if (angle - 360.0).abs() < f32::EPSILON {
                angle = 0.0;
            }
            angles.push(angle);
        }
    }
    // Plateau maxima (symmetric structures) have no strict peak.
    if angles.is_empty() {
        if let Some(j) = (0..n).max_by(|&a, &b| hist[a].total_cmp(&hist[b])) {
            let angle = 360.0 - (360.0 / n as f32) * j as f32;
            angles.push(if angle >= 360.0 { 0.0 } else { angle });
        }
    }
    angles
}

fn compute_descriptor(img: &FloatImage, point: &ScalePoint) -> Vec<f32> {
    let d = DESCR_WIDTH;
    let n = DESCR_HIST_BINS;
    let mut ori = 360.0 - point.angle;
    if (ori - 360.0).abs() < f32::EPSILON {
        ori = 0.0;
    }
    let (sin_o, cos_o) = ori.to_radians().sin_cos();
    let bins_per_deg = n as f32 / 360.0;
    let exp_scale = -1.0 / (d as f32 * d as f32 * 0.5);
    let hist_width = DESCR_SCL_FCTR * point.scale;
    let (w, h) = (img.width as isize, img.height as isize);
    let max_radius = ((w * w + h * h) as f32).sqrt();
    let radius = (hist_width * std::f32::consts::SQRT_2 * (d as f32 + 1.0) * 0.5)
        .round()
        .min(max_radius) as isize;
    let cos_t = cos_o / hist_width;
    let sin_t = sin_o / hist_width;
    let (px, py) = (point.x.round() as isize, point.y.round() as isize);

    let stride_o = n + 2;
    let stride_c = (d + 2) * stride_o;
    let mut hist = vec![0.0f32; (d + 2) * (d + 2) * (n + 2)];

    for i in -radius..=radius {
        for j in -radius..=radius {
            let c_rot = j as f32 * cos_t - i as f32 * sin_t;
            let r_rot = j as f32 * sin_t + i as f32 * cos_t;
            let rbin = r_rot + d as f32 / 2.0 - 0.5;
            let cbin = c_rot + d as f32 / 2.0 - 0.5;
            let r = py + i;
            let c = px + j;

            if !(rbin > -1.0 && rbin < d as f32 && cbin > -1.0 && cbin < d as f32) {
                continue;
            }
            if r <= 0 || r >= h - 1 || c <= 0 || c >= w - 1 {
                continue;
            }

            let (grad_mag, grad_ori) = gradient_at(img, c as usize, r as usize);
            let weight = ((c_rot * c_rot + r_rot * r_rot) * exp_scale).exp();
            let mag = grad_mag * weight;
            let obin = (grad_ori - ori) * bins_per_deg;

            let r0 = rbin.floor();
            let c0 = cbin.floor();
            let o0 = obin.floor();
            let (rf, cf, of) = (rbin - r0, cbin - c0, obin - o0);
            let mut o0 = o0 as isize;
            if o0 < 0 {
                o0 += n as isize;
            }
            if o0 >= n as isize {
                o0 -= n as isize;
            }

            let v_r1 = mag * rf;
            let v_r0 = mag - v_r1;
            let v_rc11 = v_r1 * cf;
            let v_rc10 = v_r1 - v_rc11;
            let v_rc01 = v_r0 * cf;
            let v_rc00 = v_r0 - v_rc01;
            let v_rco111 = v_rc11 * of;
            let v_rco110 = v_rc11 - v_rco111;
            let v_rco101 = v_rc10 * of;
            let v_rco100 = v_rc10 - v_rco101;
            let v_rco011 = v_rc01 * of;
            let v_rco010 = v_rc01 - v_rco011;
            let v_rco001 = v_rc00 * of;
            let v_rco000 = v_rc00 - v_rco001;

            let idx = ((r0 as isize + 1) as usize * (d + 2) + (c0 as isize + 1) as usize) * stride_o + o0 as usize;
            hist[idx] += v_rco000;
            hist[idx + 1] += v_rco001;
            hist[idx + stride_o] += v_rco010;
            hist[idx + stride_o + 1] += v_rco011;
            hist[idx + stride_c] += v_rco100;
            hist[idx + stride_c + 1] += v_rco101;
            hist[idx + stride_c + stride_o] += v_rco110;
            hist[idx + stride_c + stride_o + 1] += v_rco111;
        }
    }

    // Fold the circular orientation overflow bins and drop the spatial padding.
    let mut desc = vec![0.0f32; DESCRIPTOR_SIZE];
    for i in 0..d {
        for j in 0..d {
            let idx = ((i + 1) * (d + 2) + (j + 1)) * stride_o;
            hist[idx] += hist[idx + n];
            hist[idx + 1] += hist[idx + n + 1];
            let out = (i * d + j) * n;
            desc[out..out + n].copy_from_slice(&hist[idx..idx + n]);
        }
    }

    normalize_descriptor(&mut desc);
    desc
}

/// Unit-normalises, clips large components and renormalises.
fn normalize_descriptor(desc: &mut [f32]) {
    let norm: f32 = desc.iter().map(|v| v * v).sum::<f32>().sqrt();
    let thr = norm * DESCR_MAG_THR;
    for v in desc.iter_mut() {
        *v = v.min(thr);
    }
    let norm: f32 = desc.iter().map(|v| v * v).sum::<f32>().sqrt();
    let scale = 1.0 / norm.max(f32::EPSILON);
    for v in desc.iter_mut() {
        *v *= scale;
    }
}
