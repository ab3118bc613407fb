pub mod scene_catalog;
pub mod scene_registry;

pub use scene_catalog::SceneCatalog;
pub use scene_registry::{RegisteredScene, SceneRegistry};
