// ============================================================================
// Messaging - Event publication
// ============================================================================
//
// Publish(subject, payload) is one-way and best effort: no delivery
// confirmation is awaited by the order workflow and nothing is retried.
// Consumers must tolerate missed events.
//
// ============================================================================

mod recording;
mod redpanda;

pub use recording::RecordingPublisher;
pub use redpanda::KafkaPublisher;

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Broker rejected message: {0}")]
    Broker(String),

    #[error("Circuit breaker open for event broker")]
    CircuitOpen,

    #[error("Failed to serialize event: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PublishError {
    /// Short label for the `events_failed_total{reason}` metric.
    pub fn reason(&self) -> &'static str {
        match self {
            PublishError::Broker(_) => "broker",
            PublishError::CircuitOpen => "circuit_open",
            PublishError::Serialization(_) => "serialization",
        }
    }
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, subject: &str, key: &str, payload: &[u8]) -> Result<(), PublishError>;
}
