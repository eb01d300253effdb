//! # Presence Registry
//!
//! Authoritative identity -> last-known-state map with broadcast-on-mutation.
//!
//! ## Invariants
//! - One record per identity; a write replaces the prior record.
//! - Every mutation broadcasts the full snapshot, never a diff.
//! - Upsert and broadcast happen under one lock, so channels observe
//!   snapshots in registry arrival order.
//! - Delivery is best-effort and per-channel isolated: a full or dead
//!   channel queue never blocks or fails the write.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

use super::errors::{PresenceError, PresenceResult};
use super::record::{Identity, PresenceSnapshot, UserLocationRecord};
use crate::observability::{log_event_with_fields, Event, MetricsRegistry};

/// Snapshot sender for one channel
pub type SnapshotSender = mpsc::Sender<Arc<PresenceSnapshot>>;

/// Snapshot receiver for one channel
pub type SnapshotReceiver = mpsc::Receiver<Arc<PresenceSnapshot>>;

/// Registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceConfig {
    /// Records not rewritten within this many seconds are evicted once no
    /// live channel is bound to their identity (0 = never)
    pub record_ttl_secs: u64,

    /// How often the sweeper checks for stale records
    pub sweep_interval_secs: u64,

    /// Evict a record once the last channel bound to its identity closes
    pub evict_on_disconnect: bool,

    /// Per-channel queue depth; overflow drops that snapshot for that channel
    pub channel_buffer: usize,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            record_ttl_secs: 600,
            sweep_interval_secs: 30,
            evict_on_disconnect: true,
            channel_buffer: 16,
        }
    }
}

impl PresenceConfig {
    /// TTL as a duration, `None` when disabled
    pub fn record_ttl(&self) -> Option<Duration> {
        if self.record_ttl_secs == 0 {
            None
        } else {
            Some(Duration::seconds(self.record_ttl_secs as i64))
        }
    }
}

/// Outcome of one broadcast
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Revision of the snapshot that was broadcast
    pub revision: u64,
    /// Number of records in the snapshot
    pub records: usize,
    /// Channels the snapshot was queued for
    pub delivered: usize,
    /// Channels whose queue was full
    pub dropped: usize,
    /// Channels whose receiver is gone
    pub closed: usize,
}

/// A channel's registration, returned by [`PresenceRegistry::subscribe`].
///
/// The first queued snapshot is the registry state at subscribe time.
#[derive(Debug)]
pub struct RegistrySubscription {
    pub id: String,
    pub identity: Option<Identity>,
    pub receiver: SnapshotReceiver,
}

#[derive(Debug)]
struct Subscriber {
    identity: Option<Identity>,
    sender: SnapshotSender,
}

#[derive(Debug, Default)]
struct RegistryState {
    records: BTreeMap<Identity, UserLocationRecord>,
    subscribers: HashMap<String, Subscriber>,
    revision: u64,
}

impl RegistryState {
    fn snapshot(&self) -> PresenceSnapshot {
        PresenceSnapshot::new(self.revision, self.records.values().cloned().collect())
    }

    fn has_bound_channel(&self, identity: &Identity) -> bool {
        self.subscribers
            .values()
            .any(|s| s.identity.as_ref() == Some(identity) && !s.sender.is_closed())
    }
}

/// Shared presence registry
#[derive(Debug)]
pub struct PresenceRegistry {
    config: PresenceConfig,
    state: Mutex<RegistryState>,
    metrics: Arc<MetricsRegistry>,
}

impl Default for PresenceRegistry {
    fn default() -> Self {
        Self::new(PresenceConfig::default(), Arc::new(MetricsRegistry::new()))
    }
}

impl PresenceRegistry {
    /// Create a new registry
    pub fn new(config: PresenceConfig, metrics: Arc<MetricsRegistry>) -> Self {
        Self {
            config,
            state: Mutex::new(RegistryState::default()),
            metrics,
        }
    }

    pub fn config(&self) -> &PresenceConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    fn lock(&self) -> PresenceResult<MutexGuard<'_, RegistryState>> {
        self.state
            .lock()
            .map_err(|_| PresenceError::Internal("Lock poisoned".into()))
    }

    /// Insert or replace the record for its identity, then broadcast.
    ///
    /// Concurrent upserts for the same identity serialize on the lock; the
    /// later arrival wins.
    pub fn upsert(&self, record: UserLocationRecord) -> PresenceResult<BroadcastReport> {
        let mut state = self.lock()?;
        let identity = record.identity.clone();
        let alert_level = record.alert_level;
        state.records.insert(identity.clone(), record);
        self.metrics.increment_upserts();

        let report = self.broadcast_locked(&mut state);
        drop(state);

        log_event_with_fields(
            Event::LocationUpserted,
            &[
                ("identity", identity.as_str()),
                ("alert_level", alert_level.as_str()),
                ("revision", &report.revision.to_string()),
                ("delivered", &report.delivered.to_string()),
            ],
        );
        Ok(report)
    }

    /// Current full snapshot
    pub fn snapshot(&self) -> PresenceResult<PresenceSnapshot> {
        Ok(self.lock()?.snapshot())
    }

    /// Register a channel. The current snapshot is queued right away so a
    /// (re)connecting channel never waits for the next write.
    pub fn subscribe(&self, identity: Option<Identity>) -> PresenceResult<RegistrySubscription> {
        let buffer = self.config.channel_buffer.max(1);
        let (sender, receiver) = mpsc::channel(buffer);
        let id = Uuid::new_v4().to_string();

        let mut state = self.lock()?;
        let initial = Arc::new(state.snapshot());
        sender
            .try_send(initial)
            .map_err(|e| PresenceError::Internal(format!("initial snapshot: {}", e)))?;
        state.subscribers.insert(
            id.clone(),
            Subscriber {
                identity: identity.clone(),
                sender,
            },
        );
        drop(state);

        self.metrics.increment_channels_opened();
        Ok(RegistrySubscription {
            id,
            identity,
            receiver,
        })
    }

    /// Release a channel registration.
    ///
    /// With `evict_on_disconnect`, the bound identity's record is removed
    /// when no other live channel is bound to it; the removal is broadcast.
    pub fn unsubscribe(&self, subscription_id: &str) -> PresenceResult<Option<BroadcastReport>> {
        let mut state = self.lock()?;
        let Some(subscriber) = state.subscribers.remove(subscription_id) else {
            return Err(PresenceError::SubscriptionNotFound(
                subscription_id.to_string(),
            ));
        };
        self.metrics.increment_channels_closed();

        if !self.config.evict_on_disconnect {
            return Ok(None);
        }
        let Some(identity) = subscriber.identity else {
            return Ok(None);
        };
        if state.has_bound_channel(&identity) || state.records.remove(&identity).is_none() {
            return Ok(None);
        }

        self.metrics.increment_evictions();
        let report = self.broadcast_locked(&mut state);
        drop(state);

        log_event_with_fields(
            Event::RecordEvicted,
            &[("identity", identity.as_str()), ("reason", "disconnect")],
        );
        Ok(Some(report))
    }

    /// Evict records older than the TTL and prune dead channel registrations.
    ///
    /// A record whose identity still has a live bound channel is never aged
    /// out: participants only write when they act, so an idle but connected
    /// participant stays visible. Returns the evicted identities. One
    /// broadcast covers the whole pass.
    pub fn sweep_stale(&self, now: DateTime<Utc>) -> PresenceResult<Vec<Identity>> {
        let mut state = self.lock()?;

        let dead: Vec<String> = state
            .subscribers
            .iter()
            .filter(|(_, s)| s.sender.is_closed())
            .map(|(id, _)| id.clone())
            .collect();
        let mut orphaned = Vec::new();
        for id in dead {
            if let Some(subscriber) = state.subscribers.remove(&id) {
                self.metrics.increment_channels_closed();
                if let Some(identity) = subscriber.identity {
                    orphaned.push(identity);
                }
            }
        }

        let mut evicted: Vec<Identity> = match self.config.record_ttl() {
            Some(ttl) => state
                .records
                .values()
                .filter(|r| now - r.updated_at > ttl && !state.has_bound_channel(&r.identity))
                .map(|r| r.identity.clone())
                .collect(),
            None => Vec::new(),
        };
        if self.config.evict_on_disconnect {
            for identity in orphaned {
                if !state.has_bound_channel(&identity)
                    && state.records.contains_key(&identity)
                    && !evicted.contains(&identity)
                {
                    evicted.push(identity);
                }
            }
        }

        for identity in &evicted {
            state.records.remove(identity);
            self.metrics.increment_evictions();
        }
        if !evicted.is_empty() {
            self.broadcast_locked(&mut state);
        }
        Ok(evicted)
    }

    /// Fan the current snapshot out to every channel. Caller holds the lock.
    fn broadcast_locked(&self, state: &mut RegistryState) -> BroadcastReport {
        state.revision += 1;
        let snapshot = Arc::new(state.snapshot());
        let mut report = BroadcastReport {
            revision: snapshot.revision,
            records: snapshot.len(),
            ..Default::default()
        };

        for subscriber in state.subscribers.values() {
            match subscriber.sender.try_send(Arc::clone(&snapshot)) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => report.dropped += 1,
                Err(TrySendError::Closed(_)) => report.closed += 1,
            }
        }

        self.metrics.increment_broadcasts();
        self.metrics.add_deliveries(report.delivered as u64);
        self.metrics
            .add_dropped_deliveries((report.dropped + report.closed) as u64);
        report
    }

    /// Revision of the most recent broadcast
    pub fn revision(&self) -> u64 {
        self.lock().map(|s| s.revision).unwrap_or(0)
    }

    /// Number of records held
    pub fn len(&self) -> usize {
        self.lock().map(|s| s.records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of registered channels
    pub fn subscriber_count(&self) -> usize {
        self.lock().map(|s| s.subscribers.len()).unwrap_or(0)
    }
}
