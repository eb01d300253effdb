//! Update publisher
//!
//! Fire-and-forget delivery of `(identity, position, alertLevel)` to the
//! write endpoint. Callers never await the outcome; failures are logged and
//! never block later publishes. Idempotence is the registry's upsert.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::observability::{log_event_with_fields, Event};
use crate::presence::LocationUpdate;

use super::errors::{SessionError, SessionResult};
use super::retry::RetryPolicy;

/// Delivers updates without reporting back
pub trait UpdatePublisher: Send + Sync {
    fn publish(&self, update: LocationUpdate);
}

/// POSTs updates as JSON on a spawned task
#[derive(Debug, Clone)]
pub struct HttpPublisher {
    client: reqwest::Client,
    endpoint: String,
    retry: RetryPolicy,
}

impl HttpPublisher {
    /// `base_url` is the server root, e.g. `http://localhost:54321`
    pub fn new(base_url: &str, timeout: Duration, retry: RetryPolicy) -> SessionResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SessionError::ConfigError(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!("{}/api/location", base_url.trim_end_matches('/')),
            retry,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send one update, retrying per policy. Returns the last failure.
    pub async fn deliver(&self, update: &LocationUpdate) -> SessionResult<()> {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let outcome = self
                .client
                .post(&self.endpoint)
                .json(update)
                .send()
                .await
                .and_then(|response| response.error_for_status());

            let error = match outcome {
                Ok(_) => return Ok(()),
                Err(e) => SessionError::WriteFailure(e.to_string()),
            };

            if !self.retry.should_retry(attempts) {
                return Err(error);
            }
            tokio::time::sleep(self.retry.delay(attempts - 1)).await;
        }
    }
}

impl UpdatePublisher for HttpPublisher {
    fn publish(&self, update: LocationUpdate) {
        let publisher = self.clone();
        tokio::spawn(async move {
            log_event_with_fields(
                Event::PublishIssued,
                &[
                    ("identity", &update.email),
                    ("alert_level", update.alert_level.as_str()),
                ],
            );
            if let Err(e) = publisher.deliver(&update).await {
                log_event_with_fields(
                    Event::PublishFailed,
                    &[("identity", &update.email), ("error", &e.to_string())],
                );
            }
        });
    }
}

/// Keeps every published update in memory, in order
#[derive(Debug, Clone, Default)]
pub struct MemoryPublisher {
    published: Arc<Mutex<Vec<LocationUpdate>>>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<LocationUpdate> {
        self.published
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    pub fn count(&self) -> usize {
        self.published.lock().map(|p| p.len()).unwrap_or(0)
    }
}

impl UpdatePublisher for MemoryPublisher {
    fn publish(&self, update: LocationUpdate) {
        if let Ok(mut published) = self.published.lock() {
            published.push(update);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presence::{AlertLevel, Identity, Position};

    fn update() -> LocationUpdate {
        LocationUpdate::new(
            &Identity::new("u1").unwrap(),
            Position::new(40.0, -70.0),
            AlertLevel::Low,
        )
    }

    #[test]
    fn test_endpoint_joins_path() {
        let publisher = HttpPublisher::new(
            "http://localhost:54321/",
            Duration::from_secs(1),
            RetryPolicy::default(),
        )
        .unwrap();
        assert_eq!(publisher.endpoint(), "http://localhost:54321/api/location");
    }

    #[tokio::test]
    async fn test_deliver_reports_transport_failure() {
        // Port 9 (discard) on loopback refuses connections
        let publisher = HttpPublisher::new(
            "http://127.0.0.1:9",
            Duration::from_millis(500),
            RetryPolicy::default(),
        )
        .unwrap();
        let result = publisher.deliver(&update()).await;
        assert!(matches!(result, Err(SessionError::WriteFailure(_))));
    }

    #[tokio::test]
    async fn test_publish_failure_does_not_surface() {
        let publisher = HttpPublisher::new(
            "http://127.0.0.1:9",
            Duration::from_millis(500),
            RetryPolicy::default(),
        )
        .unwrap();
        // Returns immediately; the failure is only logged
        publisher.publish(update());
        publisher.publish(update());
    }

    #[test]
    fn test_memory_publisher_records_in_order() {
        let publisher = MemoryPublisher::new();
        publisher.publish(update());
        let mut high = update();
        high.alert_level = AlertLevel::High;
        publisher.publish(high);

        let published = publisher.published();
        assert_eq!(published.len(), 2);
        assert_eq!(published[1].alert_level, AlertLevel::High);
    }
}
