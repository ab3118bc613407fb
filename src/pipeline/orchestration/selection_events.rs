use crate::pipeline::domain::{MatchResult, SearchPhase, SelectedScene, SelectionOutcome};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Published after every completed pass
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionEvent {
    pub frame_id: Uuid,
    pub selected: Option<SelectedScene>,
    pub used_fallback: bool,
    /// The winner differs from the previous completed pass
    pub changed: bool,
    pub published_at: DateTime<Utc>,
}

/// Full result set of a pass, only published in debug mode
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticsReport {
    pub frame_id: Uuid,
    pub phase: SearchPhase,
    pub elapsed: Duration,
    pub results: Vec<MatchResult>,
}

impl DiagnosticsReport {
    pub fn from_outcome(outcome: &SelectionOutcome) -> Self {
        Self {
            frame_id: outcome.frame_id,
            phase: outcome.phase,
            elapsed: outcome.elapsed,
            results: outcome.results.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SelectionPublisher {
    selection_tx: broadcast::Sender<SelectionEvent>,
    diagnostics_tx: broadcast::Sender<DiagnosticsReport>,
}

impl SelectionPublisher {
    pub fn new(capacity: usize) -> Self {
        let (selection_tx, _) = broadcast::channel(capacity);
        let (diagnostics_tx, _) = broadcast::channel(capacity);
        Self {
            selection_tx,
            diagnostics_tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SelectionEvent> {
        self.selection_tx.subscribe()
    }

    pub fn subscribe_diagnostics(&self) -> broadcast::Receiver<DiagnosticsReport> {
        self.diagnostics_tx.subscribe()
    }

    /// Returns the number of subscribers that received the event.
    pub fn publish_selection(&self, event: SelectionEvent) -> usize {
        self.selection_tx.send(event).unwrap_or(0)
    }

    pub fn publish_diagnostics(&self, report: DiagnosticsReport) -> usize {
        self.diagnostics_tx.send(report).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(changed: bool) -> SelectionEvent {
        SelectionEvent {
            frame_id: Uuid::new_v4(),
            selected: None,
            used_fallback: false,
            changed,
            published_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn publishing_without_subscribers_is_not_an_error() {
        let publisher = SelectionPublisher::new(4);
        assert_eq!(publisher.publish_selection(event(true)), 0);
    }

    #[tokio::test]
    async fn every_subscriber_sees_the_event() {
        let publisher = SelectionPublisher::new(4);
        let mut first = publisher.subscribe();
        let mut second = publisher.subscribe();
        let sent = event(true);

        assert_eq!(publisher.publish_selection(sent.clone()), 2);
        assert_eq!(first.recv().await.expect("event"), sent);
        assert_eq!(second.recv().await.expect("event"), sent);
    }

    #[tokio::test]
    async fn diagnostics_use_their_own_channel() {
        let publisher = SelectionPublisher::new(4);
        let mut selections = publisher.subscribe();
        let mut diagnostics = publisher.subscribe_diagnostics();

        publisher.publish_diagnostics(DiagnosticsReport {
            frame_id: Uuid::new_v4(),
            phase: SearchPhase::FullScan,
            elapsed: Duration::from_millis(3),
            results: Vec::new(),
        });

        assert!(diagnostics.recv().await.is_ok());
        assert!(selections.try_recv().is_err());
    }
}
