//! Progress events and the broadcast EventBus
//!
//! Every successful write to a progress graph emits one event. Events are
//! serialized with a `type` tag so they can be forwarded verbatim over SSE.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::models::TopicStatus;

/// Progress graph change notifications
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum ProgressEvent {
    /// Empty graph created for a new learner
    GraphCreated {
        user_id: String,
        timestamp: DateTime<Utc>,
    },

    /// Mastery of one topic was recomputed from a performance sample
    MasteryUpdated {
        user_id: String,
        topic_id: String,
        mastery: f64,
        status: TopicStatus,
        timestamp: DateTime<Utc>,
    },

    /// Dependents moved from locked to learning
    TopicsUnlocked {
        user_id: String,
        mastered_topic_id: String,
        unlocked: Vec<String>,
        timestamp: DateTime<Utc>,
    },

    /// Concepts from an analyzed material were added as topics
    ConceptNodesAdded {
        user_id: String,
        added: Vec<String>,
        timestamp: DateTime<Utc>,
    },

    /// An informational edge was added or re-weighted
    TopicsLinked {
        user_id: String,
        from: String,
        to: String,
        strength: f64,
        timestamp: DateTime<Utc>,
    },
}

impl ProgressEvent {
    /// SSE event name
    pub fn event_type(&self) -> &'static str {
        match self {
            ProgressEvent::GraphCreated { .. } => "GraphCreated",
            ProgressEvent::MasteryUpdated { .. } => "MasteryUpdated",
            ProgressEvent::TopicsUnlocked { .. } => "TopicsUnlocked",
            ProgressEvent::ConceptNodesAdded { .. } => "ConceptNodesAdded",
            ProgressEvent::TopicsLinked { .. } => "TopicsLinked",
        }
    }

    pub fn user_id(&self) -> &str {
        match self {
            ProgressEvent::GraphCreated { user_id, .. }
            | ProgressEvent::MasteryUpdated { user_id, .. }
            | ProgressEvent::TopicsUnlocked { user_id, .. }
            | ProgressEvent::ConceptNodesAdded { user_id, .. }
            | ProgressEvent::TopicsLinked { user_id, .. } => user_id,
        }
    }
}

/// Broadcast channel for progress events
///
/// Cloning shares the underlying channel. Events emitted while nobody is
/// subscribed are dropped.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ProgressEvent>,
}

impl EventBus {
    /// Creates a new EventBus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, returning the number of subscribers reached
    pub fn emit(&self, event: ProgressEvent) -> usize {
        match self.tx.send(event) {
            Ok(count) => count,
            Err(broadcast::error::SendError(event)) => {
                debug!("No subscribers for {} event", event.event_type());
                0
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn created(user_id: &str) -> ProgressEvent {
        ProgressEvent::GraphCreated {
            user_id: user_id.to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_emit_without_subscribers_is_not_an_error() {
        let bus = EventBus::new(8);
        assert_eq!(bus.emit(created("u1")), 0);
    }

    #[tokio::test]
    async fn test_subscriber_receives_emitted_event() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        assert_eq!(bus.emit(created("u1")), 1);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.user_id(), "u1");
        assert_eq!(event.event_type(), "GraphCreated");
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = ProgressEvent::TopicsUnlocked {
            user_id: "u1".to_string(),
            mastered_topic_id: "algebra-1".to_string(),
            unlocked: vec!["algebra-2".to_string()],
            timestamp: Utc::now(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "TopicsUnlocked");
        assert_eq!(value["masteredTopicId"], "algebra-1");
        assert_eq!(value["unlocked"][0], "algebra-2");
    }
}
