pub mod image;
pub mod registry;

pub use registry::{RegisteredScene, SceneCatalog, SceneRegistry};
