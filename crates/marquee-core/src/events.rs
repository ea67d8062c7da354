//! Engine event stream
//!
//! Replaces per-concern callbacks: any number of consumers can subscribe to
//! the broadcast channel and react to the events they care about.

use crate::types::PlaybackState;
use serde::Serialize;
use tokio::sync::broadcast;

/// Capacity of the event channel; slow subscribers skip the oldest events
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Notable things that happen during a session
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    StateChanged {
        from: PlaybackState,
        to: PlaybackState,
    },
    /// Periodic position update
    Progress {
        item_id: String,
        position: f64,
        duration: Option<f64>,
    },
    /// Remaining time dropped below the approach-end threshold
    ApproachingEnd {
        item_id: String,
        remaining: f64,
    },
    /// Autoplay countdown tick
    AutoplayCountdown {
        next_item_id: String,
        seconds_left: u32,
    },
    /// Countdown UI should be hidden
    AutoplayDismissed,
    /// Hand-off to the next item started
    AutoplayAdvancing {
        from_item_id: String,
        next_item_id: String,
    },
    SubtitleChanged {
        stream_index: Option<i32>,
    },
    /// Content played to its end
    Completed {
        item_id: String,
    },
}

/// Sender side of the event stream
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Publish an event; dropped silently when nobody listens
    pub fn emit(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = EventBus::new();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        bus.emit(EngineEvent::AutoplayDismissed);

        assert_eq!(a.recv().await.unwrap(), EngineEvent::AutoplayDismissed);
        assert_eq!(b.recv().await.unwrap(), EngineEvent::AutoplayDismissed);
    }

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::new();
        bus.emit(EngineEvent::Completed { item_id: "x".into() });
    }

    #[test]
    fn test_event_json_shape() {
        let json = serde_json::to_value(EngineEvent::SubtitleChanged { stream_index: Some(3) }).unwrap();
        assert_eq!(json["event"], "subtitle_changed");
        assert_eq!(json["stream_index"], 3);
    }
}
