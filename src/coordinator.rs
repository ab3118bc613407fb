use crate::{
    common::CapturedFrame,
    config::Configuration,
    error::AppError,
    intake::{ChannelFrameSource, FrameSource},
    pipeline::orchestration::{FrameDisposition, PassHandle, SceneSelector},
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Frame counts of a finished run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoordinatorReport {
    pub frames: usize,
    pub accepted: usize,
    pub dropped: usize,
    pub failed: usize,
}

/// Feeds a frame source into the selector until the source ends or the
/// coordinator is stopped.
pub struct Coordinator {
    driver_task: Option<JoinHandle<Result<CoordinatorReport, AppError>>>,
    frame_tx: Option<mpsc::Sender<CapturedFrame>>,
    cancel_token: CancellationToken,
}

impl Coordinator {
    fn new(
        selector: Arc<SceneSelector>,
        source: Box<dyn FrameSource>,
        frame_tx: Option<mpsc::Sender<CapturedFrame>>,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            driver_task: Some(Self::start_driver_task(
                selector,
                source,
                cancel_token.clone(),
            )),
            frame_tx,
            cancel_token,
        }
    }

    fn start_driver_task(
        selector: Arc<SceneSelector>,
        mut source: Box<dyn FrameSource>,
        cancel_token: CancellationToken,
    ) -> JoinHandle<Result<CoordinatorReport, AppError>> {
        tokio::spawn(async move {
            let mut report = CoordinatorReport::default();
            let mut in_flight: Option<PassHandle> = None;

            loop {
                let frame = tokio::select! {
                    _ = cancel_token.cancelled() => {
                        tracing::info!("Coordinator cancelled");
                        break;
                    }
                    frame = source.next_frame() => frame?,
                };
                let Some(frame) = frame else {
                    tracing::info!("Frame source exhausted");
                    break;
                };

                report.frames += 1;
                match selector.on_frame(frame) {
                    FrameDisposition::Accepted(handle) => {
                        report.accepted += 1;
                        if let Some(previous) = in_flight.replace(handle) {
                            record(previous, &mut report).await;
                        }
                    }
                    FrameDisposition::Dropped => report.dropped += 1,
                }
            }

            if let Some(last) = in_flight.take() {
                record(last, &mut report).await;
            }
            tracing::info!(
                "Coordinator finished: {} frames, {} classified, {} dropped, {} failed",
                report.frames,
                report.accepted,
                report.dropped,
                report.failed
            );
            Ok(report)
        })
    }

    /// Sender for pushing frames when no explicit source was configured.
    pub fn frame_sender(&self) -> Option<mpsc::Sender<CapturedFrame>> {
        self.frame_tx.clone()
    }

    pub fn stop(&self) {
        self.cancel_token.cancel();
    }

    /// Wait for the driver to finish, the pass in flight is awaited.
    pub async fn wait(mut self) -> Result<CoordinatorReport, AppError> {
        // closing our sender lets a channel source end once producers are done
        self.frame_tx.take();
        match self.driver_task.take() {
            Some(task) => task
                .await
                .map_err(|e| AppError::Coordinator(e.to_string()))?,
            None => Ok(CoordinatorReport::default()),
        }
    }
}

async fn record(pass: PassHandle, report: &mut CoordinatorReport) {
    match pass.await {
        Ok(Ok(_)) => {}
        Ok(Err(_)) => report.failed += 1,
        Err(e) => {
            tracing::error!("Classification task failed: {}", e);
            report.failed += 1;
        }
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.stop();
    }
}

pub struct CoordinatorBuilder {
    configuration: Configuration,
    selector: Option<Arc<SceneSelector>>,
    source: Option<Box<dyn FrameSource>>,
    cancel_token: Option<CancellationToken>,
}

impl CoordinatorBuilder {
    pub fn new(configuration: Configuration) -> Self {
        Self {
            configuration,
            selector: None,
            source: None,
            cancel_token: None,
        }
    }

    // Adjusts the frame buffer size of the channel source, this will override the default configuration.
    pub fn frame_buffer_size(mut self, frame_buffer_size: usize) -> Self {
        self.configuration.frame_buffer_size = frame_buffer_size;
        self
    }

    pub fn selector(mut self, selector: Arc<SceneSelector>) -> Self {
        self.selector = Some(selector);
        self
    }

    // Without a source the coordinator reads from a channel, see `Coordinator::frame_sender`.
    pub fn frame_source(mut self, source: Box<dyn FrameSource>) -> Self {
        self.source = Some(source);
        self
    }

    // Ties the coordinator to an outer shutdown signal.
    pub fn cancel_token(mut self, cancel_token: CancellationToken) -> Self {
        self.cancel_token = Some(cancel_token);
        self
    }

    pub fn build(self) -> Result<Coordinator, AppError> {
        let selector = self
            .selector
            .ok_or(AppError::Coordinator("Selector not set".to_string()))?;
        let cancel_token = self.cancel_token.unwrap_or_default();

        let (source, frame_tx) = match self.source {
            Some(source) => (source, None),
            None => {
                let (source, frame_tx) =
                    ChannelFrameSource::new(self.configuration.frame_buffer_size);
                (Box::new(source) as Box<dyn FrameSource>, Some(frame_tx))
            }
        };

        Ok(Coordinator::new(selector, source, frame_tx, cancel_token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SelectorConfig;
    use crate::pipeline::orchestration::FeatureSceneMatcher;
    use crate::pipeline::services::registry::SceneCatalog;
    use image::DynamicImage;

    fn selector() -> Arc<SceneSelector> {
        let catalog = Arc::new(SceneCatalog::default());
        catalog.ensure_default().expect("default scene");
        Arc::new(SceneSelector::new(
            catalog,
            Arc::new(FeatureSceneMatcher::default()),
            SelectorConfig::default(),
        ))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_coordinator() {
        let selector = selector();
        let mut events = selector.subscribe();
        let coordinator = CoordinatorBuilder::new(Configuration::default())
            .frame_buffer_size(10)
            .selector(selector)
            .build()
            .expect("Failed to build coordinator");

        let frame_tx = coordinator.frame_sender().expect("channel source");
        frame_tx
            .send(CapturedFrame::now(DynamicImage::new_rgb8(64, 64)))
            .await
            .unwrap();
        drop(frame_tx);

        let report = coordinator.wait().await.unwrap();
        assert_eq!(report.frames, 1);
        assert_eq!(report.accepted + report.dropped, 1);
        assert_eq!(report.accepted, 1);

        let event = events.recv().await.unwrap();
        assert!(event.used_fallback);
    }

    #[tokio::test]
    async fn stop_ends_an_idle_coordinator() {
        let coordinator = CoordinatorBuilder::new(Configuration::default())
            .selector(selector())
            .build()
            .unwrap();
        let _frame_tx = coordinator.frame_sender();
        coordinator.stop();

        let report = coordinator.wait().await.unwrap();
        assert_eq!(report, CoordinatorReport::default());
    }

    #[test]
    fn build_requires_a_selector() {
        let result = CoordinatorBuilder::new(Configuration::default()).build();
        assert!(matches!(result, Err(AppError::Coordinator(_))));
    }
}
