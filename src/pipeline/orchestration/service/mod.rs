pub mod selection_service;

pub use selection_service::{SceneSelectionService, create_selection_service};
