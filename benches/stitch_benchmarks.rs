//! Benchmarks for the stitching pipeline stages

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{Rgb, RgbImage};
use panostitch::features::{detect_and_compute, match_descriptors};
use panostitch::imgproc::{get_translation_matrix, warp_perspective_rgb, BorderMode};
use panostitch::{build_panorama, AxisMode, NullObserver, StitchConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

/// Random coloured rectangles on a gray background.
fn create_scene(width: u32, height: u32, seed: u64) -> RgbImage {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut img = RgbImage::from_pixel(width, height, Rgb([110, 110, 110]));
    for _ in 0..(width * height / 150) {
        let color = Rgb([rng.gen(), rng.gen(), rng.gen()]);
        let w = rng.gen_range(3..16);
        let h = rng.gen_range(3..16);
        let x0 = rng.gen_range(0..width - w);
        let y0 = rng.gen_range(0..height - h);
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                img.put_pixel(x, y, color);
            }
        }
    }
    img
}

fn crop_columns(img: &RgbImage, x0: u32, width: u32) -> RgbImage {
    RgbImage::from_fn(width, img.height(), |x, y| *img.get_pixel(x0 + x, y))
}

fn benchmark_feature_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("sift_extraction");
    group.measurement_time(Duration::from_secs(5));
    group.sample_size(10);

    for size in [128u32, 256, 512] {
        let img = create_scene(size, size, 1);
        group.bench_with_input(BenchmarkId::new("cpu", format!("{}x{}", size, size)), &img, |b, img| {
            b.iter(|| detect_and_compute(black_box(img), 5000));
        });
    }

    group.finish();
}

fn benchmark_matching(c: &mut Criterion) {
    let mut group = c.benchmark_group("descriptor_matching");
    group.sample_size(10);

    let scene = create_scene(480, 240, 2);
    let a = detect_and_compute(&crop_columns(&scene, 0, 320), 5000);
    let b = detect_and_compute(&crop_columns(&scene, 160, 320), 5000);
    if let (Some(da), Some(db)) = (a.descriptors(), b.descriptors()) {
        group.bench_function("knn_ratio", |bench| {
            bench.iter(|| match_descriptors(black_box(da), black_box(db)));
        });
    }

    group.finish();
}

fn benchmark_warp(c: &mut Criterion) {
    let mut group = c.benchmark_group("warp_perspective");
    group.sample_size(20);

    for size in [256u32, 512, 1024] {
        let img = create_scene(size, size, 3);
        let inverse = get_translation_matrix(-(size as f64) / 2.0, 0.0);
        group.bench_with_input(BenchmarkId::new("rgb", format!("{}x{}", size, size)), &img, |b, img| {
            b.iter(|| warp_perspective_rgb(black_box(img), &inverse, size * 3 / 2, size, BorderMode::Constant(0)));
        });
    }

    group.finish();
}

fn benchmark_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_panorama");
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(10);

    let scene = create_scene(600, 300, 4);
    let images = vec![crop_columns(&scene, 0, 400), crop_columns(&scene, 200, 400)];
    let config = StitchConfig::default().with_ransac_seed(Some(1));
    group.bench_function("two_images_400x300", |b| {
        b.iter(|| build_panorama(black_box(&images), AxisMode::Auto, &config, &NullObserver));
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_feature_extraction,
    benchmark_matching,
    benchmark_warp,
    benchmark_pipeline
);
criterion_main!(benches);
