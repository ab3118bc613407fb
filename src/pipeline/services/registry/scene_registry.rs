use crate::error::RegistryError;
use crate::pipeline::domain::{SceneId, SceneSetting};
use crate::pipeline::services::image::{FeatureExtractor, FeatureSet, RegionMask};
use image::DynamicImage;
use indexmap::IndexMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

/// A scene together with the reference descriptors extracted at
/// registration time.
#[derive(Debug)]
pub struct RegisteredScene {
    setting: SceneSetting,
    mask: RegionMask,
    reference: FeatureSet,
    selected: AtomicBool,
}

impl RegisteredScene {
    /// Validate the setting, mask the reference image with the scene's own
    /// regions and extract its descriptors.
    ///
    /// The default scene is never matched, its reference image is ignored.
    pub fn prepare(
        setting: SceneSetting,
        reference: &DynamicImage,
        extractor: &FeatureExtractor,
    ) -> Result<Self, RegistryError> {
        if setting.display_name().trim().is_empty() {
            return Err(RegistryError::EmptyName(setting.id()));
        }

        let mask = setting.mask();
        if setting.is_default() {
            return Ok(Self::from_parts(setting, mask, FeatureSet::empty()));
        }

        if setting.scraps().is_empty() {
            return Err(RegistryError::NoRegions(setting.id()));
        }
        let (width, height) = (reference.width(), reference.height());
        if width == 0 || height == 0 {
            return Err(RegistryError::EmptyReference(setting.id(), width, height));
        }

        if mask.keep_pixel_count(width, height) == 0 {
            warn!(
                "Regions of scene '{}' lie outside its {}x{} reference image",
                setting.display_name(),
                width,
                height
            );
        }
        let masked = mask.apply(&reference.to_luma8());
        let features = extractor.extract(&masked, setting.detector(), setting.descriptor());
        debug!(
            "Registered scene '{}' with {} reference keypoints",
            setting.display_name(),
            features.len()
        );

        Ok(Self::from_parts(setting, mask, features))
    }

    /// Build an entry from descriptors computed elsewhere.
    pub fn from_parts(setting: SceneSetting, mask: RegionMask, reference: FeatureSet) -> Self {
        Self {
            setting,
            mask,
            reference,
            selected: AtomicBool::new(false),
        }
    }

    pub fn setting(&self) -> &SceneSetting {
        &self.setting
    }

    pub fn id(&self) -> SceneId {
        self.setting.id()
    }

    pub fn name(&self) -> &str {
        self.setting.display_name()
    }

    pub fn is_default(&self) -> bool {
        self.setting.is_default()
    }

    pub fn mask(&self) -> &RegionMask {
        &self.mask
    }

    pub fn reference(&self) -> &FeatureSet {
        &self.reference
    }

    /// False when the reference holds fewer keypoints than a pass needs,
    /// such a scene can never be selected by matching.
    pub fn can_reach(&self, min_good_matches: usize) -> bool {
        self.is_default() || self.reference.len() >= min_good_matches
    }

    pub fn is_selected(&self) -> bool {
        self.selected.load(Ordering::Acquire)
    }

    pub(crate) fn set_selected(&self, selected: bool) {
        self.selected.store(selected, Ordering::Release);
    }
}

/// Immutable, registration-ordered catalog of scenes.
///
/// Mutations build a new registry that shares the untouched entries, so a
/// snapshot held by a running pass never changes underneath it.
#[derive(Debug, Default, Clone)]
pub struct SceneRegistry {
    scenes: IndexMap<SceneId, Arc<RegisteredScene>>,
}

impl SceneRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_scenes(
        scenes: impl IntoIterator<Item = RegisteredScene>,
    ) -> Result<Self, RegistryError> {
        scenes
            .into_iter()
            .try_fold(Self::new(), |registry, scene| registry.with_scene(scene))
    }

    /// Copy of this registry with `scene` added. An existing id keeps its
    /// position and gets the new entry.
    pub fn with_scene(&self, scene: RegisteredScene) -> Result<Self, RegistryError> {
        if scene.is_default()
            && let Some(existing) = self.default_scene()
            && existing.id() != scene.id()
        {
            return Err(RegistryError::DuplicateDefault(existing.id()));
        }

        let mut scenes = self.scenes.clone();
        scenes.insert(scene.id(), Arc::new(scene));
        Ok(Self { scenes })
    }

    pub fn without(&self, id: SceneId) -> Result<Self, RegistryError> {
        let mut scenes = self.scenes.clone();
        scenes
            .shift_remove(&id)
            .ok_or(RegistryError::UnknownScene(id))?;
        Ok(Self { scenes })
    }

    pub fn get(&self, id: &SceneId) -> Option<&Arc<RegisteredScene>> {
        self.scenes.get(id)
    }

    pub fn contains(&self, id: &SceneId) -> bool {
        self.scenes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<RegisteredScene>> {
        self.scenes.values()
    }

    /// Every scene that takes part in descriptor matching.
    pub fn candidates(&self) -> impl Iterator<Item = &Arc<RegisteredScene>> {
        self.iter().filter(|scene| !scene.is_default())
    }

    pub fn default_scene(&self) -> Option<&Arc<RegisteredScene>> {
        self.iter().find(|scene| scene.is_default())
    }

    pub fn selected(&self) -> Option<&Arc<RegisteredScene>> {
        self.iter().find(|scene| scene.is_selected())
    }

    /// Select `id` and clear every other scene's flag.
    pub fn mark_selected(&self, id: Option<SceneId>) {
        for scene in self.iter() {
            scene.set_selected(Some(scene.id()) == id);
        }
    }
}
