use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::broadcast;

use switchboard_core::types::MessageId;
use switchboard_engine::ProgressReporter;

const BROADCAST_CAPACITY: usize = 256;

/// Server → client push event.
/// Wire: `{ "type": "event", "event": "command.progress", "payload": {...}, "seq": 42 }`
#[derive(Debug, Clone, Serialize)]
pub struct EventFrame {
    #[serde(rename = "type")]
    pub frame_type: &'static str,
    pub event: String,
    pub payload: Value,
    pub seq: u64,
}

/// Fan-out events to all connected WS clients via tokio broadcast channel.
#[derive(Clone)]
pub struct EventBroadcaster {
    tx: broadcast::Sender<String>,
    seq: Arc<AtomicU64>,
}

impl EventBroadcaster {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            tx,
            seq: Arc::new(AtomicU64::new(0)),
        }
    }

    /// New client subscribes to the broadcast stream.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    /// Push an event to all subscribers.
    /// Silently drops if no subscribers exist.
    pub fn emit(&self, event: &str, payload: Value) {
        let frame = EventFrame {
            frame_type: "event",
            event: event.to_string(),
            payload,
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
        };
        if let Ok(text) = serde_json::to_string(&frame) {
            let _ = self.tx.send(text);
        }
    }
}

/// Publishes pipeline steps as `command.progress` events.
pub struct BroadcastReporter {
    broadcaster: EventBroadcaster,
}

impl BroadcastReporter {
    pub fn new(broadcaster: EventBroadcaster) -> Self {
        Self { broadcaster }
    }
}

impl ProgressReporter for BroadcastReporter {
    fn report(&self, message_id: &MessageId, step: &str) {
        self.broadcaster.emit(
            "command.progress",
            json!({ "messageId": message_id, "step": step }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn progress_reaches_subscribers_in_order() {
        let broadcaster = EventBroadcaster::new();
        let mut rx = broadcaster.subscribe();
        let reporter = BroadcastReporter::new(broadcaster.clone());

        reporter.report(&MessageId::from("m-1"), "Classifying");
        reporter.report(&MessageId::from("m-1"), "Querying Shopify");

        let first: Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        let second: Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(first["type"], "event");
        assert_eq!(first["event"], "command.progress");
        assert_eq!(first["payload"]["messageId"], "m-1");
        assert_eq!(first["payload"]["step"], "Classifying");
        assert_eq!(second["seq"], 1);
    }

    #[test]
    fn emit_without_subscribers_is_silent() {
        EventBroadcaster::new().emit("command.completed", json!({}));
    }
}
