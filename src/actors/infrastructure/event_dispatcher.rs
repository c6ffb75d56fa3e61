use kameo::actor::ActorRef;
use kameo::error::{Infallible, SendError};
use kameo::message::{Context, Message};
use kameo::Actor;
use std::sync::Arc;

use crate::messaging::EventPublisher;
use crate::metrics::Metrics;

// ============================================================================
// Event Dispatcher Actor
// ============================================================================
//
// Decouples the order workflow from the broker:
// - The workflow `tell`s a serialized event and returns immediately
// - The actor publishes events one at a time, in mailbox order
// - A failed publish is logged and counted, then dropped (at-most-once)
// - A full mailbox drops the event instead of making the caller wait
//
// `Drain` is answered only after every event queued before it was handled.
//
// ============================================================================

// ============================================================================
// Messages
// ============================================================================

#[derive(Debug)]
pub struct PublishEvent {
    pub subject: String,
    pub key: String,
    pub payload: Vec<u8>,
}

#[derive(Debug)]
pub struct Drain;

// ============================================================================
// Event Dispatcher Actor
// ============================================================================

pub struct EventDispatcherActor {
    publisher: Arc<dyn EventPublisher>,
    metrics: Option<Arc<Metrics>>,
    published: u64,
    dropped: u64,
}

impl EventDispatcherActor {
    pub fn new(publisher: Arc<dyn EventPublisher>, metrics: Option<Arc<Metrics>>) -> Self {
        Self {
            publisher,
            metrics,
            published: 0,
            dropped: 0,
        }
    }
}

impl Actor for EventDispatcherActor {
    type Args = Self;
    type Error = Infallible;

    async fn on_start(state: Self::Args, _actor_ref: ActorRef<Self>) -> Result<Self, Self::Error> {
        tracing::info!("EventDispatcherActor started");
        Ok(state)
    }
}

impl Message<PublishEvent> for EventDispatcherActor {
    type Reply = ();

    async fn handle(&mut self, msg: PublishEvent, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        match self.publisher.publish(&msg.subject, &msg.key, &msg.payload).await {
            Ok(()) => {
                self.published += 1;
                tracing::info!(subject = %msg.subject, key = %msg.key, "📤 Event published");
                if let Some(ref metrics) = self.metrics {
                    metrics.record_event_published(&msg.subject);
                }
            }
            Err(e) => {
                self.dropped += 1;
                tracing::error!(
                    subject = %msg.subject,
                    key = %msg.key,
                    error = %e,
                    dropped_total = self.dropped,
                    "Failed to publish event, dropping it"
                );
                if let Some(ref metrics) = self.metrics {
                    metrics.record_event_failed(&msg.subject, e.reason());
                }
            }
        }
    }
}

impl Message<Drain> for EventDispatcherActor {
    type Reply = ();

    async fn handle(&mut self, _msg: Drain, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        tracing::debug!(published = self.published, dropped = self.dropped, "Event queue drained");
    }
}

// ============================================================================
// Handle
// ============================================================================

/// Cheap, cloneable handle used by the workflow.
#[derive(Clone)]
pub struct EventDispatcher {
    actor: ActorRef<EventDispatcherActor>,
    metrics: Option<Arc<Metrics>>,
}

impl EventDispatcher {
    pub fn spawn(publisher: Arc<dyn EventPublisher>, metrics: Option<Arc<Metrics>>) -> Self {
        let actor = EventDispatcherActor::spawn(EventDispatcherActor::new(publisher, metrics.clone()));
        Self { actor, metrics }
    }

    /// Queue an event. Never waits, neither for the broker nor for room in
    /// the mailbox.
    pub fn dispatch(&self, subject: &str, key: &str, payload: Vec<u8>) {
        let sent = self
            .actor
            .tell(PublishEvent {
                subject: subject.to_string(),
                key: key.to_string(),
                payload,
            })
            .try_send();

        let reason = match sent {
            Ok(()) => return,
            Err(SendError::MailboxFull(_)) => {
                tracing::error!(subject = %subject, key = %key, "Event queue full, event dropped");
                "queue_full"
            }
            Err(e) => {
                tracing::error!(subject = %subject, key = %key, error = ?e, "Event dispatcher unavailable, event dropped");
                "dispatcher_stopped"
            }
        };

        if let Some(ref metrics) = self.metrics {
            metrics.record_event_failed(subject, reason);
        }
    }

    /// Wait until every event queued so far has been handled.
    pub async fn drain(&self) {
        if let Err(e) = self.actor.ask(Drain).await {
            tracing::warn!(error = ?e, "Event dispatcher stopped before drain");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::RecordingPublisher;

    #[tokio::test]
    async fn test_dispatched_events_reach_publisher_in_order() {
        let publisher = Arc::new(RecordingPublisher::new());
        let dispatcher = EventDispatcher::spawn(publisher.clone(), None);

        dispatcher.dispatch("order.created", "1", b"{\"id\":1}".to_vec());
        dispatcher.dispatch("order.created", "2", b"{\"id\":2}".to_vec());
        dispatcher.drain().await;

        let messages = publisher.messages().await;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].key, "1");
        assert_eq!(messages[1].key, "2");
    }

    #[tokio::test]
    async fn test_publish_failure_is_counted_not_retried() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let publisher = Arc::new(RecordingPublisher::new());
        publisher.set_failing(true);
        let dispatcher = EventDispatcher::spawn(publisher.clone(), Some(metrics.clone()));

        dispatcher.dispatch("order.created", "7", b"{}".to_vec());
        dispatcher.drain().await;

        assert!(publisher.messages().await.is_empty());
        assert_eq!(
            metrics.events_failed.with_label_values(&["order.created", "broker"]).get(),
            1
        );
        assert_eq!(metrics.events_published.with_label_values(&["order.created"]).get(), 0);
    }

    #[tokio::test]
    async fn test_successful_publish_is_counted() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let publisher = Arc::new(RecordingPublisher::new());
        let dispatcher = EventDispatcher::spawn(publisher, Some(metrics.clone()));

        dispatcher.dispatch("order.created", "3", b"{}".to_vec());
        dispatcher.drain().await;

        assert_eq!(metrics.events_published.with_label_values(&["order.created"]).get(), 1);
    }

    #[tokio::test]
    async fn test_full_queue_drops_instead_of_waiting() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let publisher = Arc::new(RecordingPublisher::new());
        publisher.set_latency(std::time::Duration::from_secs(5)).await;
        let dispatcher = EventDispatcher::spawn(publisher, Some(metrics.clone()));

        let started = std::time::Instant::now();
        for key in 0..200 {
            dispatcher.dispatch("order.created", &key.to_string(), b"{}".to_vec());
        }

        assert!(started.elapsed() < std::time::Duration::from_secs(1));
        assert!(metrics.events_failed.with_label_values(&["order.created", "queue_full"]).get() > 0);
    }
}
