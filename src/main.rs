use futures::StreamExt;
use scene_selector::config::{Configuration, ReplayConfig};
use scene_selector::coordinator::CoordinatorBuilder;
use scene_selector::error::AppError;
use scene_selector::intake::DirectoryFrameSource;
use scene_selector::pipeline::SceneSetting;
use scene_selector::pipeline::orchestration::{FeatureSceneMatcher, SceneSelector};
use scene_selector::pipeline::services::image::{FeatureExtractor, Matcher};
use scene_selector::pipeline::services::registry::SceneCatalog;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;
use tracing::Level;

fn init_logging(log_level: &str) {
    let level = log_level.parse::<Level>().unwrap_or(Level::INFO);
    tracing_subscriber::fmt().with_max_level(level).init();
}

fn register_scenes(catalog: &SceneCatalog, replay: &ReplayConfig) -> Result<(), AppError> {
    for entry in &replay.scenes {
        let reference = image::open(&entry.reference)?;
        let setting = match entry.id {
            Some(id) => SceneSetting::with_id(
                id,
                entry.name.clone(),
                entry.regions.iter().copied(),
                entry.detector,
                entry.descriptor,
            ),
            None => SceneSetting::new(
                entry.name.clone(),
                entry.regions.iter().copied(),
                entry.detector,
                entry.descriptor,
            ),
        };
        catalog.register(setting, &reference)?;
    }
    if replay.with_default_scene {
        catalog.ensure_default()?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let configuration = Configuration::load(config_path.as_deref())?;
    init_logging(&configuration.log_level);

    let catalog = Arc::new(
        SceneCatalog::new(FeatureExtractor::new(configuration.features.clone()))
            .with_min_good_matches(configuration.matcher.min_good_matches),
    );
    register_scenes(&catalog, &configuration.replay)?;
    tracing::info!("{} scenes registered", catalog.snapshot().len());

    let matcher = FeatureSceneMatcher::new(
        catalog.extractor().clone(),
        Matcher::new(configuration.matcher.clone()),
    );
    let selector = Arc::new(SceneSelector::new(
        catalog,
        Arc::new(matcher),
        configuration.selector.clone(),
    ));

    let frames_dir = configuration
        .replay
        .frames_dir
        .clone()
        .ok_or_else(|| AppError::InvalidConfig("replay.frames_dir is not set".to_string()))?;
    let source = DirectoryFrameSource::open(&frames_dir)
        .await?
        .with_interval(Duration::from_millis(configuration.replay.frame_interval_ms));

    let mut events = BroadcastStream::new(selector.subscribe());
    let event_task = tokio::spawn(async move {
        while let Some(event) = events.next().await {
            match event {
                Ok(event) if event.changed => tracing::info!(
                    "Frame {} -> {}",
                    event.frame_id,
                    event
                        .selected
                        .as_ref()
                        .map(|scene| scene.name.as_str())
                        .unwrap_or("<none>")
                ),
                Ok(_) => {}
                Err(e) => tracing::warn!("Selection events lagged: {}", e),
            }
        }
    });

    if configuration.selector.debug {
        let mut diagnostics = BroadcastStream::new(selector.subscribe_diagnostics());
        tokio::spawn(async move {
            while let Some(Ok(report)) = diagnostics.next().await {
                match serde_json::to_string(&report) {
                    Ok(json) => tracing::debug!("{}", json),
                    Err(e) => tracing::warn!("Failed to serialize diagnostics: {}", e),
                }
            }
        });
    }

    let cancel_token = CancellationToken::new();
    let coordinator = CoordinatorBuilder::new(configuration.clone())
        .selector(selector)
        .frame_source(Box::new(source))
        .cancel_token(cancel_token.clone())
        .build()?;

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_token.cancel();
        }
    });

    let report = coordinator.wait().await?;
    // the event stream ends once the selector is gone
    if let Err(e) = event_task.await {
        tracing::warn!("Event logger failed: {}", e);
    }
    println!(
        "{} frames, {} classified, {} dropped, {} failed",
        report.frames, report.accepted, report.dropped, report.failed
    );
    Ok(())
}
