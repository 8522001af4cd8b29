//! Event publication
//!
//! Best-effort fan-out of domain events to NATS. Publication failures are
//! logged and swallowed; the ordering flow never depends on the bus.

use crate::domain::events::DomainEvent;

#[derive(Clone)]
pub struct EventPublisher {
    nats: Option<async_nats::Client>,
}

impl EventPublisher {
    pub fn new(nats: Option<async_nats::Client>) -> Self {
        Self { nats }
    }

    pub fn disabled() -> Self {
        Self { nats: None }
    }

    pub async fn publish(&self, event: &DomainEvent) {
        let Some(client) = &self.nats else { return };
        let payload = match serde_json::to_vec(event) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(error = %err, "failed to serialize domain event");
                return;
            }
        };
        if let Err(err) = client.publish(event.subject(), payload.into()).await {
            tracing::warn!(subject = event.subject(), error = %err, "failed to publish domain event");
        }
    }
}
