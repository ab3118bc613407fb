use crate::common::CapturedFrame;
use crate::error::SelectorError;
use crate::pipeline::domain::SelectionOutcome;
use crate::pipeline::orchestration::scene_selector::SceneSelector;
use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};
use tower::{Service, ServiceBuilder};

/// Exposes the selector as a tower service.
///
/// The service is always ready, a frame that arrives while a pass is
/// running resolves to `None` instead of waiting.
#[derive(Clone)]
pub struct SceneSelectionService {
    selector: Arc<SceneSelector>,
}

impl SceneSelectionService {
    pub fn new(selector: Arc<SceneSelector>) -> Self {
        Self { selector }
    }

    pub fn selector(&self) -> &Arc<SceneSelector> {
        &self.selector
    }
}

impl Service<CapturedFrame> for SceneSelectionService {
    type Response = Option<SelectionOutcome>;
    type Error = SelectorError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, frame: CapturedFrame) -> Self::Future {
        let selector = Arc::clone(&self.selector);
        Box::pin(async move { selector.select_scene(frame).await })
    }
}

pub fn create_selection_service(
    selector: Arc<SceneSelector>,
) -> impl Service<CapturedFrame, Response = Option<SelectionOutcome>, Error = SelectorError> + Clone
{
    ServiceBuilder::new().service(SceneSelectionService::new(selector))
}
