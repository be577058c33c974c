use crate::compositor::warp_and_composite;
use crate::config::{AxisMode, StitchAxis, StitchConfig};
use crate::crop::crop_black_border;
use crate::direction::{detect_axis, vertical_placement};
use crate::fallback::{concat_horizontal, concat_vertical};
use crate::observer::{StitchDecision, StitchEvent, StitchObserver, TracingObserver};
use crate::overlap::{analyze_pair, PairAnalysis};
use crate::{Result, StitchError};
use image::RgbImage;
use pano_features::{estimate_homography, Features};

/// Assembled output of one run.
#[derive(Debug, Clone)]
pub struct Panorama {
    pub image: RgbImage,
    pub axis: StitchAxis,
}

/// Owns an observer and runs [`build_panorama`] with it.
pub struct Stitcher {
    observer: Box<dyn StitchObserver>,
}

impl Default for Stitcher {
    fn default() -> Self {
        Self {
            observer: Box::new(TracingObserver),
        }
    }
}

impl Stitcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_observer(observer: impl StitchObserver + 'static) -> Self {
        Self {
            observer: Box::new(observer),
        }
    }

    pub fn stitch(&self, images: &[RgbImage], axis_mode: AxisMode, config: &StitchConfig) -> Result<Panorama> {
        build_panorama(images, axis_mode, config, self.observer.as_ref())
    }
}

/// Folds `images` left to right into one cropped panorama.
///
/// Only fewer than two images is fatal; every per-pair failure degrades to
/// concatenation along the resolved axis.
pub fn build_panorama(
    images: &[RgbImage],
    axis_mode: AxisMode,
    config: &StitchConfig,
    observer: &dyn StitchObserver,
) -> Result<Panorama> {
    if images.len() < 2 {
        return Err(StitchError::InsufficientImages { found: images.len() });
    }
    observer.on_event(&StitchEvent::RunStarted { images: images.len() });

    let mut axis = match axis_mode {
        AxisMode::Horizontal => Some(StitchAxis::Horizontal),
        AxisMode::Vertical => Some(StitchAxis::Vertical),
        AxisMode::Auto => None,
    };
    if let Some(axis) = axis {
        observer.on_event(&StitchEvent::AxisResolved { axis, detected: false });
    }

    let mut canvas = images[0].clone();
    for (index, image) in images.iter().enumerate().skip(1) {
        let analysis = analyze_pair(&canvas, image, config);
        observer.on_event(&StitchEvent::FeaturesDetected {
            keypoints1: analysis.features1.num_keypoints(),
            keypoints2: analysis.features2.num_keypoints(),
        });
        observer.on_event(&StitchEvent::MatchesFound {
            matches: analysis.overlap.match_count,
            overlap: analysis.overlap.fraction,
        });

        let pair_axis = match axis {
            Some(axis) => axis,
            None => {
                let detected = resolve_axis(&canvas, image, &analysis, config);
                let resolved = detected.unwrap_or(StitchAxis::Horizontal);
                observer.on_event(&StitchEvent::AxisResolved {
                    axis: resolved,
                    detected: detected.is_some(),
                });
                axis = Some(resolved);
                resolved
            }
        };

        let (merged, decision) = merge_pair(&canvas, image, &analysis, pair_axis, config)?;
        observer.on_event(&StitchEvent::MergeCompleted {
            index,
            decision,
            width: merged.width(),
            height: merged.height(),
        });
        canvas = merged;
    }

    let image = crop_black_border(&canvas, config.crop_threshold);
    observer.on_event(&StitchEvent::Cropped {
        width: image.width(),
        height: image.height(),
    });

    Ok(Panorama {
        image,
        axis: axis.unwrap_or(StitchAxis::Horizontal),
    })
}

fn resolve_axis(
    image1: &RgbImage,
    image2: &RgbImage,
    analysis: &PairAnalysis,
    config: &StitchConfig,
) -> Option<StitchAxis> {
    let (k1, k2) = (analysis.features1.keypoints()?, analysis.features2.keypoints()?);
    detect_axis(k1, k2, &analysis.matches, image1.dimensions(), image2.dimensions(), config)
}

/// Homography merge of `image` into `canvas`, if the pair supports one.
pub fn align_pair(canvas: &RgbImage, image: &RgbImage, analysis: &PairAnalysis, config: &StitchConfig) -> Result<RgbImage> {
    let (k1, k2) = match (&analysis.features1, &analysis.features2) {
        (Features::Detected { keypoints: k1, .. }, Features::Detected { keypoints: k2, .. }) => (k1, k2),
        _ => return Err(StitchError::FeatureExtractionEmpty),
    };

    let overlap = analysis.overlap;
    if overlap.match_count < config.min_matches {
        return Err(StitchError::InsufficientMatches {
            found: overlap.match_count,
            required: config.min_matches,
        });
    }
    if !overlap.is_eligible(config) {
        return Err(StitchError::InsufficientOverlap {
            fraction: overlap.fraction,
            required: config.min_overlap,
        });
    }

    let fit = estimate_homography(k1, k2, &analysis.matches, config.min_matches, &config.ransac())?;
    warp_and_composite(canvas, image, &fit.homography, config.max_canvas_dim)
}

/// One reduction step: homography when possible, concatenation otherwise.
pub fn merge_pair(
    canvas: &RgbImage,
    image: &RgbImage,
    analysis: &PairAnalysis,
    axis: StitchAxis,
    config: &StitchConfig,
) -> Result<(RgbImage, StitchDecision)> {
    let reason = match align_pair(canvas, image, analysis, config) {
        Ok(merged) => return Ok((merged, StitchDecision::Homography)),
        Err(err) => err.to_string(),
    };

    let merged = match axis {
        StitchAxis::Horizontal => concat_horizontal(canvas, image, config.max_height_difference)?,
        StitchAxis::Vertical => {
            let placement = vertical_placement(
                analysis.features1.keypoints(),
                analysis.features2.keypoints(),
                &analysis.matches,
                config,
            );
            concat_vertical(canvas, image, placement, config.max_height_difference)?
        }
    };
    Ok((merged, StitchDecision::FallbackConcat { reason }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::{NullObserver, RecordingObserver};
    use image::Rgb;

    fn solid(w: u32, h: u32, v: u8) -> RgbImage {
        RgbImage::from_pixel(w, h, Rgb([v, v, v]))
    }

    #[test]
    fn fewer_than_two_images_is_fatal() {
        let config = StitchConfig::default();
        for n in 0..2 {
            let images = vec![solid(20, 20, 100); n];
            assert!(matches!(
                build_panorama(&images, AxisMode::Auto, &config, &NullObserver),
                Err(StitchError::InsufficientImages { found }) if found == n
            ));
        }
    }

    #[test]
    fn featureless_pair_falls_back_horizontally() {
        let images = vec![solid(60, 40, 120), solid(70, 40, 200)];
        let pano = build_panorama(&images, AxisMode::Auto, &StitchConfig::default(), &NullObserver).unwrap();
        assert_eq!(pano.axis, StitchAxis::Horizontal);
        assert_eq!(pano.image.dimensions(), (130, 40));
    }

    #[test]
    fn fixed_vertical_mode_stacks_images() {
        let images = vec![solid(50, 30, 120), solid(50, 25, 200), solid(50, 10, 60)];
        let pano = build_panorama(&images, AxisMode::Vertical, &StitchConfig::default(), &NullObserver).unwrap();
        assert_eq!(pano.axis, StitchAxis::Vertical);
        assert_eq!(pano.image.dimensions(), (50, 65));
        // Default placement puts each new image above the canvas.
        assert_eq!(pano.image.get_pixel(0, 0), &Rgb([60, 60, 60]));
        assert_eq!(pano.image.get_pixel(0, 64), &Rgb([120, 120, 120]));
    }

    #[test]
    fn events_are_emitted_in_order() {
        let recorder = RecordingObserver::new();
        let images = vec![solid(30, 30, 90), solid(30, 30, 180)];
        build_panorama(&images, AxisMode::Auto, &StitchConfig::default(), &recorder).unwrap();
        let events = recorder.events();

        assert_eq!(events.first(), Some(&StitchEvent::RunStarted { images: 2 }));
        assert!(events.contains(&StitchEvent::AxisResolved {
            axis: StitchAxis::Horizontal,
            detected: false,
        }));
        let merge = events
            .iter()
            .find_map(|e| match e {
                StitchEvent::MergeCompleted { index, decision, .. } => Some((*index, decision.clone())),
                _ => None,
            })
            .unwrap();
        assert_eq!(merge.0, 1);
        assert!(matches!(merge.1, StitchDecision::FallbackConcat { .. }));
        assert_eq!(events.last(), Some(&StitchEvent::Cropped { width: 60, height: 30 }));
    }

    #[test]
    fn dark_padding_is_cropped_from_result() {
        // The second image sits below the crop threshold and is trimmed away.
        let images = vec![solid(40, 40, 200), solid(40, 40, 5)];
        let pano = build_panorama(&images, AxisMode::Horizontal, &StitchConfig::default(), &NullObserver).unwrap();
        assert_eq!(pano.image.dimensions(), (40, 40));
    }

    #[test]
    fn stitcher_wrapper_uses_its_observer() {
        let stitcher = Stitcher::new();
        let images = vec![solid(16, 16, 100), solid(16, 16, 150)];
        let pano = stitcher.stitch(&images, AxisMode::Horizontal, &StitchConfig::default()).unwrap();
        assert_eq!(pano.image.dimensions(), (32, 16));
    }
}
