pub mod domain;
pub mod orchestration;
pub mod services;

pub use domain::{MatchResult, SceneId, SceneSetting, SelectionOutcome};
pub use orchestration::{SceneSelector, SelectionEvent};
pub use services::{SceneCatalog, SceneRegistry};
