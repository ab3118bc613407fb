pub mod common;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod intake;
pub mod pipeline;

pub use common::{CapturedFrame, ImageRegion};
pub use config::Configuration;
pub use coordinator::{Coordinator, CoordinatorBuilder, CoordinatorReport};
pub use error::{AppError, MatchError, RegistryError, SelectorError};
pub use pipeline::orchestration::{FeatureSceneMatcher, SceneMatcher, SceneSelector};
pub use pipeline::{SceneCatalog, SceneSetting, SelectionEvent, SelectionOutcome};
