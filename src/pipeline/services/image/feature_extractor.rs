use super::descriptors::{DescriptorMethod, PATCH_RADIUS};
use super::detectors::DetectorMethod;
use super::keypoints::FeatureSet;
use crate::config::FeatureConfig;
use image::{GrayImage, imageops};
use std::time::Instant;
use tracing::debug;

/// Detects keypoints and computes their descriptors.
///
/// Extraction is a pure function of the image and the algorithm pair.
/// Degenerate input (zero-sized or fully masked images) yields an empty
/// [`FeatureSet`] rather than an error.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    config: FeatureConfig,
}

impl FeatureExtractor {
    pub fn new(config: FeatureConfig) -> Self {
        Self { config }
    }

    pub fn extract(
        &self,
        image: &GrayImage,
        detector: DetectorMethod,
        descriptor: DescriptorMethod,
    ) -> FeatureSet {
        let start = Instant::now();
        let (width, height) = image.dimensions();
        if width <= 2 * PATCH_RADIUS || height <= 2 * PATCH_RADIUS {
            return FeatureSet::empty();
        }
        if image.pixels().all(|p| p.0[0] == 0) {
            return FeatureSet::empty();
        }

        let corner_detector = detector.build(&self.config);
        let describer = descriptor.build();

        let mut keypoints: Vec<_> = corner_detector
            .detect(image)
            .into_iter()
            .filter(|k| {
                let (x, y) = (k.x as u32, k.y as u32);
                x >= PATCH_RADIUS
                    && y >= PATCH_RADIUS
                    && x < width - PATCH_RADIUS
                    && y < height - PATCH_RADIUS
            })
            .collect();

        if keypoints.is_empty() {
            return FeatureSet::empty();
        }

        let smoothed = if self.config.blur_radius > 0.0 {
            imageops::blur(image, self.config.blur_radius)
        } else {
            image.clone()
        };

        let descriptors = keypoints
            .iter_mut()
            .map(|keypoint| describer.compute(&smoothed, keypoint))
            .collect();

        debug!(
            "{}/{} extracted {} keypoints in {}us",
            corner_detector.name(),
            describer.name(),
            keypoints.len(),
            start.elapsed().as_micros()
        );

        FeatureSet::new(keypoints, descriptors).described_by(descriptor)
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new(FeatureConfig::default())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::Luma;
    use rand::{Rng, SeedableRng, rngs::StdRng};

    /// Random 8x8 blocks, rich in corners with distinct neighbourhoods.
    pub(crate) fn block_texture(width: u32, height: u32, seed: u64) -> GrayImage {
        let mut rng = StdRng::seed_from_u64(seed);
        let columns = width.div_ceil(8);
        let rows = height.div_ceil(8);
        let cells: Vec<u8> = (0..columns * rows).map(|_| rng.random()).collect();
        GrayImage::from_fn(width, height, |x, y| {
            Luma([cells[((y / 8) * columns + x / 8) as usize]])
        })
    }

    #[test]
    fn textured_image_yields_features() {
        let extractor = FeatureExtractor::default();
        let features = extractor.extract(
            &block_texture(128, 128, 11),
            DetectorMethod::Fast,
            DescriptorMethod::Orb,
        );
        assert!(features.len() >= 20);
        assert_eq!(features.keypoints().len(), features.descriptors().len());
        assert_eq!(features.method(), Some(DescriptorMethod::Orb));
    }

    #[test]
    fn extraction_is_deterministic() {
        let extractor = FeatureExtractor::default();
        let image = block_texture(96, 96, 3);
        for detector in [DetectorMethod::Fast, DetectorMethod::Harris] {
            for descriptor in [DescriptorMethod::Brief, DescriptorMethod::Orb] {
                let a = extractor.extract(&image, detector, descriptor);
                let b = extractor.extract(&image, detector, descriptor);
                assert_eq!(a, b);
            }
        }
    }

    #[test]
    fn fully_masked_image_is_empty_not_an_error() {
        let extractor = FeatureExtractor::default();
        let features = extractor.extract(
            &GrayImage::new(128, 128),
            DetectorMethod::Fast,
            DescriptorMethod::Brief,
        );
        assert!(features.is_empty());
    }

    #[test]
    fn zero_sized_image_is_empty() {
        let extractor = FeatureExtractor::default();
        let features = extractor.extract(
            &GrayImage::new(0, 0),
            DetectorMethod::Harris,
            DescriptorMethod::Orb,
        );
        assert!(features.is_empty());
    }

    #[test]
    fn keypoints_respect_patch_border() {
        let extractor = FeatureExtractor::default();
        let features = extractor.extract(
            &block_texture(80, 80, 5),
            DetectorMethod::Fast,
            DescriptorMethod::Brief,
        );
        assert!(features.keypoints().iter().all(|k| {
            k.x >= PATCH_RADIUS as f32
                && k.y >= PATCH_RADIUS as f32
                && k.x < (80 - PATCH_RADIUS) as f32
                && k.y < (80 - PATCH_RADIUS) as f32
        }));
    }
}
