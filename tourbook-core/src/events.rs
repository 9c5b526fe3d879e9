use async_trait::async_trait;

/// Publishes domain events to the message bus.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, topic: &str, key: &str, payload: &str) -> Result<(), String>;
}

/// Publisher used when no broker is configured.
pub struct NoopPublisher;

#[async_trait]
impl EventPublisher for NoopPublisher {
    async fn publish(&self, topic: &str, key: &str, _payload: &str) -> Result<(), String> {
        tracing::debug!("Event bus disabled, dropping {} event for {}", topic, key);
        Ok(())
    }
}
