//! Domain event publishing over NATS
//!
//! Publishing never fails a request: without a connection events are logged at
//! debug level, and send errors are logged and dropped.

use crate::domain::events::DomainEvent;

#[derive(Clone, Default)]
pub struct EventPublisher {
    nats: Option<async_nats::Client>,
}

impl EventPublisher {
    /// Connects when `url` is set; a failed connection leaves publishing disabled.
    pub async fn connect(url: Option<&str>) -> Self {
        let Some(url) = url else { return Self::default() };
        match async_nats::connect(url).await {
            Ok(client) => {
                tracing::info!(url, "connected to NATS");
                Self { nats: Some(client) }
            }
            Err(e) => {
                tracing::warn!(url, error = %e, "NATS unavailable, events will only be logged");
                Self::default()
            }
        }
    }

    pub fn is_connected(&self) -> bool { self.nats.is_some() }

    pub fn publish(&self, event: DomainEvent) {
        let subject = event.subject();
        let Some(client) = self.nats.clone() else {
            tracing::debug!(subject = %subject, ?event, "event (no bus)");
            return;
        };
        let payload = match serde_json::to_vec(&event) {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(subject = %subject, error = %e, "failed to encode event");
                return;
            }
        };
        tokio::spawn(async move {
            if let Err(e) = client.publish(subject.clone(), payload.into()).await {
                tracing::warn!(subject = %subject, error = %e, "failed to publish event");
            }
        });
    }
}
