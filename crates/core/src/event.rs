//! Domain event system: decoupled observation of the query pipeline.
//!
//! The orchestrator publishes events as a turn moves through routing,
//! dispatch, tool-call resolution and persistence. Subscribers (the gateway,
//! tests, a future metrics sink) react without coupling to the orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A learner query entered the orchestrator
    QueryReceived {
        user_id: String,
        session_id: String,
        query_preview: String,
        timestamp: DateTime<Utc>,
    },

    /// The classifier picked a responder
    ResponderDispatched {
        responder: String,
        session_id: String,
        timestamp: DateTime<Utc>,
    },

    /// A tool call emitted by one responder was answered by another
    ToolCallResolved {
        origin: String,
        target: String,
        callback: String,
        hops: usize,
        timestamp: DateTime<Utc>,
    },

    /// The final answer was appended to the session log
    AnswerPersisted {
        session_id: String,
        author: String,
        position: u64,
        timestamp: DateTime<Utc>,
    },

    /// An error ended or degraded a turn
    ErrorOccurred {
        context: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_sees_tool_call_resolution() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(DomainEvent::ToolCallResolved {
            origin: "SwaraPatternAgent".into(),
            target: "RagaInfoAgent".into(),
            callback: "process_raga_info".into(),
            hops: 1,
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        match event.as_ref() {
            DomainEvent::ToolCallResolved { target, hops, .. } => {
                assert_eq!(target, "RagaInfoAgent");
                assert_eq!(*hops, 1);
            }
            _ => panic!("Expected ToolCallResolved event"),
        }
    }

    #[test]
    fn publishing_without_subscribers_is_silent() {
        let bus = EventBus::default();
        bus.publish(DomainEvent::ErrorOccurred {
            context: "test".into(),
            error_message: "no subscribers".into(),
            timestamp: Utc::now(),
        });
    }
}
