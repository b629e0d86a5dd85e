//! Notification fan-out for automation runs.
//!
//! The orchestrator publishes to a bounded broadcast channel; any host (CLI
//! printer, HTTP service job table) subscribes and relays. Delivery is
//! fire-and-forget, at-least-once per transition to every live subscriber.

use tokio::sync::broadcast;

use crate::status::{AutomationStatus, ProgressUpdate};

/// Events emitted during an automation run.
#[derive(Debug, Clone)]
pub enum AutomationEvent {
    StatusChanged { status: AutomationStatus },
    Progress(ProgressUpdate),
    Error { message: String },
}

/// Broadcasts automation events to all subscribers.
#[derive(Clone)]
pub struct EventBroadcaster {
    tx: broadcast::Sender<AutomationEvent>,
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBroadcaster {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(256);
        Self { tx }
    }

    pub fn status_changed(&self, status: AutomationStatus) {
        // Ignore errors; no subscribers is fine
        let _ = self.tx.send(AutomationEvent::StatusChanged { status });
    }

    pub fn progress(&self, update: ProgressUpdate) {
        let _ = self.tx.send(AutomationEvent::Progress(update));
    }

    pub fn error(&self, message: impl Into<String>) {
        let _ = self.tx.send(AutomationEvent::Error {
            message: message.into(),
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AutomationEvent> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_reach_subscribers_in_order() {
        let events = EventBroadcaster::new();
        let mut rx = events.subscribe();

        events.status_changed(AutomationStatus::Initializing);
        events.progress(ProgressUpdate::now(
            AutomationStatus::Initializing,
            "starting",
            5,
        ));
        events.error("boom");

        assert!(matches!(
            rx.recv().await.unwrap(),
            AutomationEvent::StatusChanged {
                status: AutomationStatus::Initializing
            }
        ));
        match rx.recv().await.unwrap() {
            AutomationEvent::Progress(p) => assert_eq!(p.percentage, 5),
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(matches!(rx.recv().await.unwrap(), AutomationEvent::Error { .. }));
    }

    #[test]
    fn publishing_without_subscribers_does_not_panic() {
        let events = EventBroadcaster::new();
        events.status_changed(AutomationStatus::Idle);
        events.error("nobody listening");
    }
}
