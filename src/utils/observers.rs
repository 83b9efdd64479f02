//! Best-effort fan-out to observer connections (supervising dashboards).
//!
//! Delivery is fire-and-forget: a slow or absent observer never back-pressures
//! the call pipeline.

use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::trace;

const CHANNEL_CAPACITY: usize = 128;

/// Events mirrored out to observers
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum ObserverEvent {
    Transcription {
        text: String,
        source: String,
        priority: String,
    },
    Summary {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        memory: Option<Value>,
    },
}

/// Broadcast hub connecting the pipeline to observer sockets
pub struct ObserverHub {
    tx: broadcast::Sender<ObserverEvent>,
}

impl ObserverHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ObserverEvent> {
        self.tx.subscribe()
    }

    /// Publish an event; silently dropped when nobody is listening
    pub fn publish(&self, event: ObserverEvent) {
        let receivers = self.tx.receiver_count();
        trace!(receivers, "Publishing observer event");
        let _ = self.tx.send(event);
    }

    pub fn observer_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ObserverHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_published_events() {
        let hub = ObserverHub::new();
        let mut rx = hub.subscribe();

        hub.publish(ObserverEvent::Transcription {
            text: "hello".to_string(),
            source: "quick-response".to_string(),
            priority: "delayed".to_string(),
        });

        let event = rx.recv().await.unwrap();
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "transcription");
        assert_eq!(json["source"], "quick-response");
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let hub = ObserverHub::new();
        hub.publish(ObserverEvent::Summary {
            text: "short call".to_string(),
            memory: None,
        });
        assert_eq!(hub.observer_count(), 0);
    }
}
