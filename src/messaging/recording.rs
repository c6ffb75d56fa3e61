use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

use super::{EventPublisher, PublishError};

/// A message captured by `RecordingPublisher`.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub subject: String,
    pub key: String,
    pub payload: Vec<u8>,
}

impl PublishedMessage {
    pub fn json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_slice(&self.payload)
    }
}

/// In-process publisher that keeps every message. Can be switched to fail
/// or slowed down.
#[derive(Default)]
pub struct RecordingPublisher {
    messages: Mutex<Vec<PublishedMessage>>,
    failing: AtomicBool,
    latency: Mutex<Option<Duration>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Delay every publish by `latency`.
    pub async fn set_latency(&self, latency: Duration) {
        *self.latency.lock().await = Some(latency);
    }

    pub async fn messages(&self) -> Vec<PublishedMessage> {
        self.messages.lock().await.clone()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, subject: &str, key: &str, payload: &[u8]) -> Result<(), PublishError> {
        let latency = *self.latency.lock().await;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        if self.failing.load(Ordering::SeqCst) {
            return Err(PublishError::Broker("recording publisher set to fail".to_string()));
        }

        self.messages.lock().await.push(PublishedMessage {
            subject: subject.to_string(),
            key: key.to_string(),
            payload: payload.to_vec(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_messages_in_order() {
        let publisher = RecordingPublisher::new();
        publisher.publish("order.created", "1", b"{\"a\":1}").await.unwrap();
        publisher.publish("order.created", "2", b"{\"a\":2}").await.unwrap();

        let messages = publisher.messages().await;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].key, "2");
        assert_eq!(messages[0].json().unwrap()["a"], 1);
    }

    #[tokio::test]
    async fn test_failing_publisher_records_nothing() {
        let publisher = RecordingPublisher::new();
        publisher.set_failing(true);

        let err = publisher.publish("order.created", "1", b"{}").await.unwrap_err();

        assert_eq!(err.reason(), "broker");
        assert!(publisher.messages().await.is_empty());
    }
}
