use crate::pipeline::domain::{MatchResult, SceneId};
use std::sync::{Mutex, PoisonError};

/// Scenes worth trying first on the next frame.
///
/// Filled from the last full scan with every scene that passed or came
/// closer to passing than the near-miss threshold. The content is always
/// replaced as a whole, never patched.
#[derive(Debug, Default)]
pub struct MatchCache {
    scenes: Mutex<Vec<SceneId>>,
}

impl MatchCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn candidates(&self) -> Vec<SceneId> {
        self.scenes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn replace(&self, scenes: Vec<SceneId>) {
        *self.scenes.lock().unwrap_or_else(PoisonError::into_inner) = scenes;
    }

    /// Rebuild from a full scan, returns the number of cached scenes.
    pub fn refill(&self, results: &[MatchResult], near_miss_threshold: f32) -> usize {
        let scenes = worth_caching(results, near_miss_threshold);
        let count = scenes.len();
        self.replace(scenes);
        count
    }
}

/// Passing scenes plus near misses, in result order.
pub fn worth_caching(results: &[MatchResult], near_miss_threshold: f32) -> Vec<SceneId> {
    results
        .iter()
        .filter(|result| result.passed || result.closeness > near_miss_threshold)
        .map(|result| result.scene_id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn keeps_passes_and_near_misses() {
        let a = MatchResult::scored(Uuid::new_v4(), "A", true, 10.0);
        let b = MatchResult::scored(Uuid::new_v4(), "B", false, 40.0).with_closeness(60.0);
        let c = MatchResult::scored(Uuid::new_v4(), "C", false, 95.0).with_closeness(5.0);
        let cache = MatchCache::new();

        let count = cache.refill(&[a.clone(), b.clone(), c], 50.0);

        assert_eq!(count, 2);
        assert_eq!(cache.candidates(), vec![a.scene_id, b.scene_id]);
    }

    #[test]
    fn threshold_is_exclusive() {
        let edge = MatchResult::scored(Uuid::new_v4(), "Edge", false, 50.0).with_closeness(50.0);
        assert!(worth_caching(&[edge], 50.0).is_empty());
    }

    #[test]
    fn far_misses_are_dropped_whatever_their_score() {
        // nearly every reference keypoint unmatched, few accepted matches
        let unrelated =
            MatchResult::scored(Uuid::new_v4(), "Shop", false, 96.5).with_closeness(25.0);
        assert!(worth_caching(&[unrelated], 50.0).is_empty());
    }

    #[test]
    fn refill_drops_previous_entries() {
        let cache = MatchCache::new();
        cache.replace(vec![Uuid::new_v4(), Uuid::new_v4()]);
        cache.refill(&[MatchResult::scored(Uuid::new_v4(), "C", false, 1.0)], 50.0);
        assert!(cache.candidates().is_empty());
    }
}
