use super::scene::SceneId;
use crate::pipeline::services::image::{KnnMatch, Keypoint, MatchOutcome};
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

/// Outcome of matching one scene against one frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub scene_id: SceneId,
    pub scene_name: String,
    pub passed: bool,
    pub score: f32,
    /// Progress towards passing, 100 once passed
    pub closeness: f32,
    pub accepted_matches: usize,
    /// Raw k-NN correspondences, only used for diagnostics
    pub knn_matches: Vec<KnnMatch>,
    /// Keypoints found in the masked frame, only used for diagnostics
    pub frame_keypoints: Vec<Keypoint>,
}

impl MatchResult {
    pub fn from_outcome(
        scene_id: SceneId,
        scene_name: impl Into<String>,
        outcome: MatchOutcome,
        frame_keypoints: Vec<Keypoint>,
    ) -> Self {
        Self {
            scene_id,
            scene_name: scene_name.into(),
            passed: outcome.passed,
            score: outcome.score,
            closeness: outcome.closeness,
            accepted_matches: outcome.accepted,
            knn_matches: outcome.matches,
            frame_keypoints,
        }
    }

    /// Failing result with score 0, used when a scene could not be matched.
    pub fn failed(scene_id: SceneId, scene_name: impl Into<String>) -> Self {
        Self {
            scene_id,
            scene_name: scene_name.into(),
            passed: false,
            score: 0.0,
            closeness: 0.0,
            accepted_matches: 0,
            knn_matches: Vec::new(),
            frame_keypoints: Vec::new(),
        }
    }

    /// Synthetic always-pass result for the fallback scene.
    pub fn fallback(scene_id: SceneId, scene_name: impl Into<String>) -> Self {
        Self {
            passed: true,
            closeness: 100.0,
            ..Self::failed(scene_id, scene_name)
        }
    }
}

#[cfg(test)]
impl MatchResult {
    pub(crate) fn scored(
        scene_id: SceneId,
        scene_name: impl Into<String>,
        passed: bool,
        score: f32,
    ) -> Self {
        Self {
            passed,
            score,
            closeness: if passed { 100.0 } else { 0.0 },
            ..Self::failed(scene_id, scene_name)
        }
    }

    pub(crate) fn with_closeness(mut self, closeness: f32) -> Self {
        self.closeness = closeness;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SearchPhase {
    /// Only the scenes remembered from the previous full scan were matched
    Cached,
    /// Every registered scene was matched
    FullScan,
    /// Nothing was matched, the registry had no candidate scenes
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectedScene {
    pub id: SceneId,
    pub name: String,
}

/// Final decision for one frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionOutcome {
    pub frame_id: Uuid,
    pub selected: Option<SelectedScene>,
    /// Every result of the pass, best first
    pub results: Vec<MatchResult>,
    pub used_fallback: bool,
    pub phase: SearchPhase,
    pub elapsed: Duration,
}

impl SelectionOutcome {
    pub fn selected_id(&self) -> Option<SceneId> {
        self.selected.as_ref().map(|scene| scene.id)
    }
}
