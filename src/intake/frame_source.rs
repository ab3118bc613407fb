use crate::common::CapturedFrame;
use crate::error::AppError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, warn};

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "webp"];

/// Push side of the capture boundary. `Ok(None)` ends the stream.
#[async_trait]
pub trait FrameSource: Send {
    async fn next_frame(&mut self) -> Result<Option<CapturedFrame>, AppError>;
}

/// Frames pushed by an external capture task through a channel
pub struct ChannelFrameSource {
    frame_rx: mpsc::Receiver<CapturedFrame>,
}

impl ChannelFrameSource {
    pub fn new(frame_buffer_size: usize) -> (Self, mpsc::Sender<CapturedFrame>) {
        let (frame_tx, frame_rx) = mpsc::channel(frame_buffer_size.max(1));
        (Self { frame_rx }, frame_tx)
    }
}

#[async_trait]
impl FrameSource for ChannelFrameSource {
    async fn next_frame(&mut self) -> Result<Option<CapturedFrame>, AppError> {
        Ok(self.frame_rx.recv().await)
    }
}

/// Replays the images of a directory in file name order, optionally paced
/// like a live capture.
pub struct DirectoryFrameSource {
    pending: VecDeque<PathBuf>,
    pacing: Option<Interval>,
}

impl DirectoryFrameSource {
    pub async fn open(directory: &Path) -> Result<Self, AppError> {
        let mut entries = tokio::fs::read_dir(directory).await?;
        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if is_image(&path) {
                paths.push(path);
            }
        }
        paths.sort();
        debug!("Replaying {} frames from {}", paths.len(), directory.display());

        Ok(Self {
            pending: paths.into(),
            pacing: None,
        })
    }

    pub fn with_interval(mut self, period: Duration) -> Self {
        if !period.is_zero() {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            self.pacing = Some(interval);
        }
        self
    }
}

#[async_trait]
impl FrameSource for DirectoryFrameSource {
    async fn next_frame(&mut self) -> Result<Option<CapturedFrame>, AppError> {
        while let Some(path) = self.pending.pop_front() {
            if let Some(pacing) = self.pacing.as_mut() {
                pacing.tick().await;
            }
            let loaded = tokio::task::spawn_blocking({
                let path = path.clone();
                move || image::open(path)
            })
            .await
            .map_err(|e| AppError::Coordinator(e.to_string()))?;

            match loaded {
                Ok(image) => return Ok(Some(CapturedFrame::now(image))),
                Err(e) => warn!("Skipping unreadable frame {}: {}", path.display(), e),
            }
        }
        Ok(None)
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(extension))
        })
}
