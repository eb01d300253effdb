//! # Stale Record Sweeper
//!
//! Background task that periodically runs [`PresenceRegistry::sweep_stale`].

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::registry::PresenceRegistry;
use crate::observability::{log_event_with_fields, Event};

/// Handle to a running sweeper. Dropping it stops the task.
#[derive(Debug)]
pub struct Sweeper {
    shutdown_tx: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl Sweeper {
    /// Spawn the sweeper on the current runtime
    pub fn spawn(registry: Arc<PresenceRegistry>) -> Self {
        let period = Duration::from_secs(registry.config().sweep_interval_secs.max(1));
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // First tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match registry.sweep_stale(Utc::now()) {
                            Ok(evicted) if !evicted.is_empty() => {
                                let names: Vec<&str> = evicted.iter().map(|i| i.as_str()).collect();
                                log_event_with_fields(
                                    Event::RecordsSwept,
                                    &[
                                        ("count", &evicted.len().to_string()),
                                        ("identities", &names.join(",")),
                                    ],
                                );
                            }
                            Ok(_) => {}
                            Err(e) => log_event_with_fields(Event::SweepFailed, &[("error", &e.to_string())]),
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
        });

        Self {
            shutdown_tx,
            handle: Some(handle),
        }
    }

    /// Stop the sweeper and wait for it to exit
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::MetricsRegistry;
    use crate::presence::record::{AlertLevel, Identity, Position, UserLocationRecord};
    use crate::presence::registry::PresenceConfig;

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_evicts_after_ttl() {
        let config = PresenceConfig {
            record_ttl_secs: 1,
            sweep_interval_secs: 1,
            ..Default::default()
        };
        let registry = Arc::new(PresenceRegistry::new(config, Arc::new(MetricsRegistry::new())));
        let mut record = UserLocationRecord::new(
            Identity::new("u1").unwrap(),
            Position::new(1.0, 2.0),
            AlertLevel::Low,
        );
        // Wall-clock TTL: backdate instead of waiting
        record.updated_at = Utc::now() - chrono::Duration::seconds(10);
        registry.upsert(record).unwrap();

        let sweeper = Sweeper::spawn(Arc::clone(&registry));
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(registry.is_empty());

        sweeper.shutdown().await;
    }
}
