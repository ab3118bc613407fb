use super::match_cache::MatchCache;
use super::result_aggregator::ResultAggregator;
use super::scene_matcher::{PreparedFrame, SceneMatcher};
use super::selection_events::{DiagnosticsReport, SelectionEvent, SelectionPublisher};
use super::single_flight::{FlightGuard, SingleFlight};
use crate::common::CapturedFrame;
use crate::config::SelectorConfig;
use crate::error::{MatchError, SelectorError};
use crate::pipeline::domain::{MatchResult, SceneId, SearchPhase, SelectionOutcome};
use crate::pipeline::services::registry::{RegisteredScene, SceneCatalog};
use chrono::Utc;
use futures::future::join_all;
use std::any::Any;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub type PassHandle = JoinHandle<Result<SelectionOutcome, SelectorError>>;

/// What happened to a frame handed to [`SceneSelector::on_frame`]
#[derive(Debug)]
pub enum FrameDisposition {
    /// A pass was started for the frame
    Accepted(PassHandle),
    /// A pass was already running, the frame was discarded
    Dropped,
}

impl FrameDisposition {
    pub fn is_accepted(&self) -> bool {
        matches!(self, FrameDisposition::Accepted(_))
    }
}

/// Classifies frames against the scene catalog, one pass at a time.
///
/// Scenes remembered from the previous full scan are tried first, the full
/// catalog is only scanned when none of them passes.
pub struct SceneSelector {
    catalog: Arc<SceneCatalog>,
    matcher: Arc<dyn SceneMatcher>,
    config: SelectorConfig,
    cache: MatchCache,
    flight: SingleFlight,
    publisher: SelectionPublisher,
    last_selected: Mutex<Option<SceneId>>,
}

impl SceneSelector {
    pub fn new(
        catalog: Arc<SceneCatalog>,
        matcher: Arc<dyn SceneMatcher>,
        config: SelectorConfig,
    ) -> Self {
        let publisher = SelectionPublisher::new(config.event_capacity.max(1));
        Self {
            catalog,
            matcher,
            config,
            cache: MatchCache::new(),
            flight: SingleFlight::new(),
            publisher,
            last_selected: Mutex::new(None),
        }
    }

    pub fn cached_scenes(&self) -> Vec<SceneId> {
        self.cache.candidates()
    }

    pub fn is_busy(&self) -> bool {
        self.flight.is_busy()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SelectionEvent> {
        self.publisher.subscribe()
    }

    pub fn subscribe_diagnostics(&self) -> broadcast::Receiver<DiagnosticsReport> {
        self.publisher.subscribe_diagnostics()
    }

    /// Start a pass in the background unless one is already running.
    pub fn on_frame(self: &Arc<Self>, frame: CapturedFrame) -> FrameDisposition {
        let Some(guard) = self.flight.try_acquire() else {
            debug!("Selector busy, dropping frame {}", frame.frame_id());
            return FrameDisposition::Dropped;
        };

        let selector = Arc::clone(self);
        FrameDisposition::Accepted(tokio::spawn(async move {
            selector.run_pass(frame, guard).await
        }))
    }

    /// Run a pass inline. `Ok(None)` means the frame was dropped because a
    /// pass was already running.
    pub async fn select_scene(
        &self,
        frame: CapturedFrame,
    ) -> Result<Option<SelectionOutcome>, SelectorError> {
        match self.flight.try_acquire() {
            Some(guard) => self.run_pass(frame, guard).await.map(Some),
            None => {
                debug!("Selector busy, dropping frame {}", frame.frame_id());
                Ok(None)
            }
        }
    }

    async fn run_pass(
        &self,
        frame: CapturedFrame,
        _guard: FlightGuard,
    ) -> Result<SelectionOutcome, SelectorError> {
        let frame_id = frame.frame_id();
        let result = self.classify(frame).await;
        if let Err(e) = &result {
            error!("Classification of frame {} failed: {}", frame_id, e);
        }
        result
    }

    async fn classify(&self, frame: CapturedFrame) -> Result<SelectionOutcome, SelectorError> {
        let start = Instant::now();
        let registry = self.catalog.snapshot();
        let prepared = Arc::new(prepare(frame).await?);

        let cached: Vec<Arc<RegisteredScene>> = self
            .cache
            .candidates()
            .iter()
            .filter_map(|id| registry.get(id))
            .filter(|scene| !scene.is_default())
            .cloned()
            .collect();

        let mut cached_hit = None;
        if !cached.is_empty() {
            let results = self.match_scenes(cached, &prepared).await;
            if results.iter().any(|result| result.passed) {
                cached_hit = Some(results);
            } else {
                debug!("No cached scene passed, escalating to a full scan");
            }
        }

        let (results, phase) = match cached_hit {
            Some(results) => (results, SearchPhase::Cached),
            None => {
                let candidates: Vec<_> = registry.candidates().cloned().collect();
                let (results, phase) = if candidates.is_empty() {
                    (Vec::new(), SearchPhase::Skipped)
                } else {
                    (
                        self.match_scenes(candidates, &prepared).await,
                        SearchPhase::FullScan,
                    )
                };
                let count = self
                    .cache
                    .refill(&results, self.config.near_miss_threshold);
                debug!("Match cache refilled with {} scenes", count);
                (results, phase)
            }
        };

        let aggregation = ResultAggregator::aggregate(results, &registry);
        let selected_id = aggregation.selected.as_ref().map(|scene| scene.id);
        registry.mark_selected(selected_id);

        let outcome = SelectionOutcome {
            frame_id: prepared.frame_id(),
            selected: aggregation.selected,
            results: aggregation.results,
            used_fallback: aggregation.used_fallback,
            phase,
            elapsed: start.elapsed(),
        };
        debug!(
            "Frame {} classified in {}us ({:?}, {} results)",
            outcome.frame_id,
            outcome.elapsed.as_micros(),
            outcome.phase,
            outcome.results.len()
        );

        self.emit(&outcome);
        Ok(outcome)
    }

    /// One blocking task per scene, awaited together. A task that fails or
    /// panics is recorded as a failing result with score 0.
    async fn match_scenes(
        &self,
        scenes: Vec<Arc<RegisteredScene>>,
        frame: &Arc<PreparedFrame>,
    ) -> Vec<MatchResult> {
        let tasks = scenes.into_iter().map(|scene| {
            let matcher = Arc::clone(&self.matcher);
            let frame = Arc::clone(frame);
            let scene_id = scene.id();
            let scene_name = scene.name().to_string();
            let handle = tokio::task::spawn_blocking(move || matcher.match_scene(&scene, &frame));

            async move {
                let outcome = match handle.await {
                    Ok(result) => result,
                    Err(e) if e.is_panic() => Err(MatchError::Panicked(
                        scene_id,
                        panic_message(e.into_panic()),
                    )),
                    Err(_) => Err(MatchError::Cancelled(scene_id)),
                };
                outcome.unwrap_or_else(|e| {
                    warn!("{}", e);
                    MatchResult::failed(scene_id, scene_name)
                })
            }
        });

        join_all(tasks).await
    }

    fn emit(&self, outcome: &SelectionOutcome) {
        let selected_id = outcome.selected_id();
        let changed = {
            let mut last = self
                .last_selected
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let changed = *last != selected_id;
            *last = selected_id;
            changed
        };

        if changed {
            match &outcome.selected {
                Some(scene) => info!("Selected scene '{}' ({})", scene.name, scene.id),
                None => info!("No scene selected"),
            }
        }

        self.publisher.publish_selection(SelectionEvent {
            frame_id: outcome.frame_id,
            selected: outcome.selected.clone(),
            used_fallback: outcome.used_fallback,
            changed,
            published_at: Utc::now(),
        });

        if self.config.debug {
            self.publisher
                .publish_diagnostics(DiagnosticsReport::from_outcome(outcome));
        }
    }
}

/// Convert the frame to grayscale once, off the async workers.
async fn prepare(frame: CapturedFrame) -> Result<PreparedFrame, SelectorError> {
    let (width, height) = frame.dimensions();
    if width == 0 || height == 0 {
        return Err(SelectorError::EmptyFrame(width, height));
    }

    tokio::task::spawn_blocking(move || {
        PreparedFrame::new(frame.frame_id(), frame.image().to_luma8())
    })
    .await
    .map_err(|e| SelectorError::Preparation(e.to_string()))
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
