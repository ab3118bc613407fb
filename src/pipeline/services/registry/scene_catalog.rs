use super::scene_registry::{RegisteredScene, SceneRegistry};
use crate::config::MatcherConfig;
use crate::error::RegistryError;
use crate::pipeline::domain::{SceneId, SceneSetting};
use crate::pipeline::services::image::FeatureExtractor;
use image::DynamicImage;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{info, warn};

/// Shared handle to the current registry.
///
/// Readers take an `Arc` snapshot at the start of a pass, writers extract
/// outside the lock and swap in a new registry.
#[derive(Debug)]
pub struct SceneCatalog {
    extractor: FeatureExtractor,
    min_good_matches: usize,
    current: RwLock<Arc<SceneRegistry>>,
}

impl SceneCatalog {
    pub fn new(extractor: FeatureExtractor) -> Self {
        Self::with_registry(extractor, SceneRegistry::new())
    }

    pub fn with_registry(extractor: FeatureExtractor, registry: SceneRegistry) -> Self {
        Self {
            extractor,
            min_good_matches: MatcherConfig::default().min_good_matches,
            current: RwLock::new(Arc::new(registry)),
        }
    }

    /// Pass threshold of the matcher in use, registrations below it are
    /// reported.
    pub fn with_min_good_matches(mut self, min_good_matches: usize) -> Self {
        self.min_good_matches = min_good_matches;
        self
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    pub fn snapshot(&self) -> Arc<SceneRegistry> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Swap the whole registry, returning the previous one.
    pub fn replace(&self, registry: SceneRegistry) -> Arc<SceneRegistry> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *current, Arc::new(registry))
    }

    /// Register a scene, or re-register it when its id is already known.
    pub fn register(
        &self,
        setting: SceneSetting,
        reference: &DynamicImage,
    ) -> Result<SceneId, RegistryError> {
        let scene = RegisteredScene::prepare(setting, reference, &self.extractor)?;
        let id = scene.id();
        let name = scene.name().to_string();
        if !scene.can_reach(self.min_good_matches) {
            warn!(
                "Scene '{}' has only {} reference keypoints, {} are needed to pass",
                name,
                scene.reference().len(),
                self.min_good_matches
            );
        }
        let replaced = self.update(|registry| registry.with_scene(scene))?;
        if replaced {
            info!("Re-registered scene '{}' ({})", name, id);
        } else {
            info!("Registered scene '{}' ({})", name, id);
        }
        Ok(id)
    }

    /// Register the fallback scene unless one exists already.
    pub fn ensure_default(&self) -> Result<SceneId, RegistryError> {
        if let Some(existing) = self.snapshot().default_scene() {
            return Ok(existing.id());
        }
        self.register(SceneSetting::default_scene(), &DynamicImage::new_luma8(0, 0))
    }

    pub fn remove(&self, id: SceneId) -> Result<(), RegistryError> {
        self.update(|registry| registry.without(id))?;
        info!("Removed scene {}", id);
        Ok(())
    }

    fn update(
        &self,
        change: impl FnOnce(&SceneRegistry) -> Result<SceneRegistry, RegistryError>,
    ) -> Result<bool, RegistryError> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let next = change(&**current)?;
        let replaced = next.len() == current.len();
        *current = Arc::new(next);
        Ok(replaced)
    }
}

impl Default for SceneCatalog {
    fn default() -> Self {
        Self::new(FeatureExtractor::default())
    }
}
