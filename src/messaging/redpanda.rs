use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use std::sync::Arc;
use std::time::Duration;

use super::{EventPublisher, PublishError};
use crate::actors::{HealthProbe, HealthStatus};
use crate::config::BrokerConfig;
use crate::metrics::Metrics;
use crate::utils::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitState};

/// Kafka/Redpanda producer for order events. Subjects map 1:1 to topics.
pub struct KafkaPublisher {
    producer: FutureProducer,
    circuit_breaker: CircuitBreaker,
    send_timeout: Duration,
}

impl KafkaPublisher {
    pub fn new(config: &BrokerConfig) -> Result<Self, PublishError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("message.timeout.ms", config.message_timeout_ms.to_string())
            .create()
            .map_err(|e| PublishError::Broker(format!("Failed to create producer: {}", e)))?;

        let cb_config = CircuitBreakerConfig {
            failure_threshold: 5,
            timeout: Duration::from_secs(30),
            success_threshold: 3,
        };

        Ok(Self {
            producer,
            circuit_breaker: CircuitBreaker::new("event_broker", cb_config),
            send_timeout: Duration::from_millis(config.message_timeout_ms),
        })
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.circuit_breaker = self.circuit_breaker.with_metrics(metrics);
        self
    }

    pub async fn get_circuit_breaker_state(&self) -> CircuitState {
        self.circuit_breaker.get_state().await
    }

    /// Wait for in-flight messages before shutdown.
    pub fn flush(&self, timeout: Duration) {
        if let Err(e) = self.producer.flush(Timeout::After(timeout)) {
            tracing::warn!(error = %e, "Producer flush incomplete, pending events dropped");
        }
    }
}

#[async_trait]
impl EventPublisher for KafkaPublisher {
    async fn publish(&self, subject: &str, key: &str, payload: &[u8]) -> Result<(), PublishError> {
        let result = self
            .circuit_breaker
            .call(async {
                let record = FutureRecord::to(subject).key(key).payload(payload);

                self.producer
                    .send(record, Timeout::After(self.send_timeout))
                    .await
                    .map_err(|(e, _)| e)
            })
            .await;

        match result {
            Ok(_) => {
                tracing::debug!(topic = %subject, key = %key, "Published to broker");
                Ok(())
            }
            Err(CircuitBreakerError::CircuitOpen) => Err(PublishError::CircuitOpen),
            Err(CircuitBreakerError::OperationFailed(e)) => Err(PublishError::Broker(e.to_string())),
        }
    }
}

#[async_trait]
impl HealthProbe for KafkaPublisher {
    fn component(&self) -> &'static str {
        "event_broker"
    }

    async fn probe(&self) -> HealthStatus {
        HealthStatus::from_circuit(self.get_circuit_breaker_state().await)
    }
}
