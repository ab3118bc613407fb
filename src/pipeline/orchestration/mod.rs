pub mod match_cache;
pub mod result_aggregator;
pub mod scene_matcher;
pub mod scene_selector;
pub mod selection_events;
pub mod service;
pub mod single_flight;

pub use match_cache::MatchCache;
pub use result_aggregator::{Aggregation, ResultAggregator};
pub use scene_matcher::{FeatureSceneMatcher, PreparedFrame, SceneMatcher};
pub use scene_selector::{FrameDisposition, PassHandle, SceneSelector};
pub use selection_events::{DiagnosticsReport, SelectionEvent, SelectionPublisher};
pub use service::{SceneSelectionService, create_selection_service};
pub use single_flight::{FlightGuard, SingleFlight};
