pub mod match_result;
pub mod scene;

pub use match_result::{MatchResult, SearchPhase, SelectedScene, SelectionOutcome};
pub use scene::{DEFAULT_SCENE_NAME, SceneId, SceneSetting};
