use crate::error::MatchError;
use crate::pipeline::domain::MatchResult;
use crate::pipeline::services::image::{FeatureExtractor, Matcher};
use crate::pipeline::services::registry::RegisteredScene;
use image::GrayImage;
use uuid::Uuid;

/// Grayscale copy of a captured frame, shared read-only by every matching
/// task of a pass.
#[derive(Debug)]
pub struct PreparedFrame {
    frame_id: Uuid,
    gray: GrayImage,
}

impl PreparedFrame {
    pub fn new(frame_id: Uuid, gray: GrayImage) -> Self {
        Self { frame_id, gray }
    }

    pub fn frame_id(&self) -> Uuid {
        self.frame_id
    }

    pub fn gray(&self) -> &GrayImage {
        &self.gray
    }
}

/// Matches one registered scene against one prepared frame.
///
/// Runs on the blocking pool, one call per scene per pass.
pub trait SceneMatcher: Send + Sync {
    fn match_scene(
        &self,
        scene: &RegisteredScene,
        frame: &PreparedFrame,
    ) -> Result<MatchResult, MatchError>;
}

/// Mask, extract and match using the scene's own algorithm pair.
#[derive(Debug, Clone, Default)]
pub struct FeatureSceneMatcher {
    extractor: FeatureExtractor,
    matcher: Matcher,
}

impl FeatureSceneMatcher {
    pub fn new(extractor: FeatureExtractor, matcher: Matcher) -> Self {
        Self { extractor, matcher }
    }
}

impl SceneMatcher for FeatureSceneMatcher {
    fn match_scene(
        &self,
        scene: &RegisteredScene,
        frame: &PreparedFrame,
    ) -> Result<MatchResult, MatchError> {
        let setting = scene.setting();
        if let Some(method) = scene.reference().method()
            && method != setting.descriptor()
        {
            return Err(MatchError::DescriptorMismatch(
                scene.id(),
                method,
                setting.descriptor(),
            ));
        }

        let masked = scene.mask().apply(frame.gray());
        let features = self
            .extractor
            .extract(&masked, setting.detector(), setting.descriptor());
        let outcome = self.matcher.match_features(scene.reference(), &features);

        Ok(MatchResult::from_outcome(
            scene.id(),
            scene.name(),
            outcome,
            features.keypoints().to_vec(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ImageRegion;
    use crate::pipeline::domain::SceneSetting;
    use crate::pipeline::services::image::feature_extractor::tests::block_texture;
    use crate::pipeline::services::image::{DescriptorMethod, DetectorMethod};
    use image::DynamicImage;

    fn scene(seed: u64, descriptor: DescriptorMethod) -> RegisteredScene {
        RegisteredScene::prepare(
            SceneSetting::new(
                "Status",
                [ImageRegion::new(16, 16, 128, 96)],
                DetectorMethod::Fast,
                descriptor,
            ),
            &DynamicImage::ImageLuma8(block_texture(160, 128, seed)),
            &FeatureExtractor::default(),
        )
        .expect("valid scene")
    }

    #[test]
    fn identical_frame_passes() {
        let matcher = FeatureSceneMatcher::default();
        for descriptor in [DescriptorMethod::Brief, DescriptorMethod::Orb] {
            let scene = scene(7, descriptor);
            let frame = PreparedFrame::new(Uuid::new_v4(), block_texture(160, 128, 7));
            let result = matcher.match_scene(&scene, &frame).expect("match");

            assert!(result.passed, "{descriptor:?} should pass");
            assert!(result.score < 50.0);
            assert_eq!(result.frame_keypoints.len(), scene.reference().len());
        }
    }

    #[test]
    fn unrelated_frame_fails() {
        let matcher = FeatureSceneMatcher::default();
        let scene = scene(7, DescriptorMethod::Orb);
        let frame = PreparedFrame::new(Uuid::new_v4(), block_texture(160, 128, 8));
        let result = matcher.match_scene(&scene, &frame).expect("match");
        assert!(!result.passed);
    }

    #[test]
    fn reference_from_another_descriptor_is_rejected() {
        let setting = SceneSetting::new(
            "Status",
            [ImageRegion::new(16, 16, 128, 96)],
            DetectorMethod::Fast,
            DescriptorMethod::Brief,
        );
        let mask = setting.mask();
        let reference = FeatureExtractor::default().extract(
            &mask.apply(&block_texture(160, 128, 7)),
            DetectorMethod::Fast,
            DescriptorMethod::Orb,
        );
        let scene = RegisteredScene::from_parts(setting, mask, reference);
        let frame = PreparedFrame::new(Uuid::new_v4(), block_texture(160, 128, 7));

        let result = FeatureSceneMatcher::default().match_scene(&scene, &frame);
        assert!(matches!(
            result,
            Err(MatchError::DescriptorMismatch(
                _,
                DescriptorMethod::Orb,
                DescriptorMethod::Brief
            ))
        ));
    }

    #[test]
    fn blank_frame_fails_with_zero_score() {
        let matcher = FeatureSceneMatcher::default();
        let scene = scene(7, DescriptorMethod::Brief);
        let frame = PreparedFrame::new(Uuid::new_v4(), GrayImage::new(160, 128));
        let result = matcher.match_scene(&scene, &frame).expect("match");
        assert!(!result.passed);
        assert_eq!(result.score, 0.0);
        assert!(result.frame_keypoints.is_empty());
    }
}
