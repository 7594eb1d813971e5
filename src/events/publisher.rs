use serde_json::Value;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Fire-and-forget publisher for batch lifecycle events.
///
/// Built on a broadcast channel: publishing never blocks the run, and a run
/// with no observers is not an error. Slow subscribers that fall behind the
/// channel capacity lose the oldest events, not the run.
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<BatchEvent>,
}

/// A published lifecycle event.
#[derive(Debug, Clone)]
pub struct BatchEvent {
    /// Event name, one of [`crate::events::names`].
    pub name: String,
    /// Run the event belongs to.
    pub run_id: Uuid,
    /// Process name of the run.
    pub process_name: String,
    /// Event payload.
    pub context: Value,
    /// Publication timestamp.
    pub published_at: chrono::DateTime<chrono::Utc>,
}

impl EventPublisher {
    /// Create a publisher with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event.
    pub async fn publish(
        &self,
        name: impl Into<String>,
        run_id: Uuid,
        process_name: impl Into<String>,
        context: Value,
    ) -> Result<(), PublishError> {
        self.publish_now(name, run_id, process_name, context);
        Ok(())
    }

    /// Synchronous publication path for callers inside a lock or other
    /// non-async context. Broadcast sends never await.
    pub(crate) fn publish_now(
        &self,
        name: impl Into<String>,
        run_id: Uuid,
        process_name: impl Into<String>,
        context: Value,
    ) {
        let event = BatchEvent {
            name: name.into(),
            run_id,
            process_name: process_name.into(),
            context,
            published_at: chrono::Utc::now(),
        };

        // send() errors only when there are no subscribers, which is fine
        // for lifecycle publication.
        let _ = self.sender.send(event);
    }

    /// Subscribe to events.
    pub fn subscribe(&self) -> broadcast::Receiver<BatchEvent> {
        self.sender.subscribe()
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(1024)
    }
}

/// Error types for event publishing.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("event channel is closed")]
    ChannelClosed,
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::names;
    use serde_json::json;

    #[tokio::test]
    async fn test_publish_and_receive() {
        let publisher = EventPublisher::new(16);
        let mut receiver = publisher.subscribe();
        let run_id = Uuid::new_v4();

        publisher
            .publish(names::BATCH_STARTED, run_id, "reindex", json!({"total": 10}))
            .await
            .unwrap();

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.name, names::BATCH_STARTED);
        assert_eq!(event.run_id, run_id);
        assert_eq!(event.process_name, "reindex");
        assert_eq!(event.context["total"], 10);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let publisher = EventPublisher::new(16);
        assert_eq!(publisher.subscriber_count(), 0);
        publisher
            .publish(names::BATCH_COMPLETED, Uuid::new_v4(), "reindex", json!({}))
            .await
            .unwrap();
    }
}
