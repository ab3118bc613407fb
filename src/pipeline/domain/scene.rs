use crate::common::{ImageRegion, ScrapInfo};
use crate::pipeline::services::image::{DescriptorMethod, DetectorMethod, RegionMask};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Display name reserved for the fallback scene
pub const DEFAULT_SCENE_NAME: &str = "Default";

pub type SceneId = Uuid;

/// A registered UI state, identified by the features inside its regions.
///
/// Settings are authored elsewhere and never change once created,
/// re-registering under the same id replaces the whole setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneSetting {
    id: SceneId,
    display_name: String,
    scraps: Vec<ScrapInfo>,
    detector: DetectorMethod,
    descriptor: DescriptorMethod,
}

impl SceneSetting {
    pub fn new(
        display_name: impl Into<String>,
        regions: impl IntoIterator<Item = ImageRegion>,
        detector: DetectorMethod,
        descriptor: DescriptorMethod,
    ) -> Self {
        Self::with_id(Uuid::new_v4(), display_name, regions, detector, descriptor)
    }

    pub fn with_id(
        id: SceneId,
        display_name: impl Into<String>,
        regions: impl IntoIterator<Item = ImageRegion>,
        detector: DetectorMethod,
        descriptor: DescriptorMethod,
    ) -> Self {
        let scraps = regions
            .into_iter()
            .enumerate()
            .map(|(index, area)| ScrapInfo::new(index, area))
            .collect();
        Self {
            id,
            display_name: display_name.into(),
            scraps,
            detector,
            descriptor,
        }
    }

    /// The fallback scene, it has no regions and is never matched.
    pub fn default_scene() -> Self {
        Self::new(
            DEFAULT_SCENE_NAME,
            [],
            DetectorMethod::Fast,
            DescriptorMethod::Brief,
        )
    }

    pub fn id(&self) -> SceneId {
        self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn scraps(&self) -> &[ScrapInfo] {
        &self.scraps
    }

    pub fn detector(&self) -> DetectorMethod {
        self.detector
    }

    pub fn descriptor(&self) -> DescriptorMethod {
        self.descriptor
    }

    pub fn is_default(&self) -> bool {
        self.display_name == DEFAULT_SCENE_NAME
    }

    pub fn mask(&self) -> RegionMask {
        RegionMask::new(self.scraps.iter().map(|scrap| scrap.area))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regions_are_indexed_in_authoring_order() {
        let setting = SceneSetting::new(
            "Race menu",
            [ImageRegion::new(0, 0, 4, 4), ImageRegion::new(8, 8, 2, 2)],
            DetectorMethod::Fast,
            DescriptorMethod::Orb,
        );
        let indices: Vec<_> = setting.scraps().iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![0, 1]);
        assert_eq!(setting.mask().keep_pixel_count(16, 16), 16 + 4);
        assert!(!setting.is_default());
    }

    #[test]
    fn default_scene_is_recognised_by_name() {
        assert!(SceneSetting::default_scene().is_default());
        let named = SceneSetting::new(
            DEFAULT_SCENE_NAME,
            [ImageRegion::new(0, 0, 1, 1)],
            DetectorMethod::Harris,
            DescriptorMethod::Brief,
        );
        assert!(named.is_default());
    }
}
