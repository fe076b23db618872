use std::path::PathBuf;

use serde::Serialize;
use tokio::sync::broadcast;

/// A progress or lifecycle notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Event {
    /// Human-readable progress while pulling from a remote.
    PullProgress {
        reference: String,
        remote: String,
        message: String,
    },
    PullCompleted {
        reference: String,
        path: String,
    },
    LinkCreated {
        alias: String,
        dir: PathBuf,
    },
    LinkRemoved {
        alias: String,
        dir: PathBuf,
    },
    CheckoutCompleted {
        alias: String,
        dir: PathBuf,
    },
    DatasetSaved {
        alias: String,
        path: String,
    },
}

/// Fire-and-forget event sink. `publish` never blocks on subscribers.
pub trait EventBus: Send + Sync {
    fn publish(&self, event: Event);
}

/// An event bus that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopBus;

impl EventBus for NoopBus {
    fn publish(&self, _event: Event) {}
}

/// An event bus backed by a tokio broadcast channel.
///
/// Slow subscribers lose the oldest events rather than stalling publishers.
pub struct BroadcastBus {
    sender: broadcast::Sender<Event>,
}

impl BroadcastBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }
}

impl EventBus for BroadcastBus {
    fn publish(&self, event: Event) {
        // No subscribers is not an error.
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_broadcast_delivers() {
        let bus = BroadcastBus::new(8);
        let mut rx = bus.subscribe();
        bus.publish(Event::DatasetSaved {
            alias: "peer/movies".to_string(),
            path: "/mem/abc".to_string(),
        });
        let event = rx.recv().await.unwrap();
        assert!(matches!(event, Event::DatasetSaved { .. }));
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = BroadcastBus::new(1);
        for _ in 0..4 {
            bus.publish(Event::PullCompleted {
                reference: "peer/movies".to_string(),
                path: "/mem/abc".to_string(),
            });
        }
        NoopBus.publish(Event::PullCompleted {
            reference: "peer/movies".to_string(),
            path: "/mem/abc".to_string(),
        });
    }

    #[test]
    fn test_event_serializes_with_tag() {
        let event = Event::LinkRemoved {
            alias: "peer/movies".to_string(),
            dir: PathBuf::from("/work/movies"),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "linkRemoved");
        assert_eq!(json["alias"], "peer/movies");
    }
}
