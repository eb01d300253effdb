//! Metrics registry
//!
//! - Counters only, monotonic, reset on process start
//! - Thread-safe, lock-free

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Operational counters for the presence server
///
/// Relaxed ordering throughout; counters are read for reporting only.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// Accepted writes
    upserts: AtomicU64,
    /// Writes rejected at the endpoint
    writes_rejected: AtomicU64,
    /// Full-snapshot broadcasts
    broadcasts: AtomicU64,
    /// Snapshots queued to channels
    deliveries: AtomicU64,
    /// Snapshots dropped (full or closed channel queue)
    dropped_deliveries: AtomicU64,
    /// Records evicted
    evictions: AtomicU64,
    /// Channels subscribed
    channels_opened: AtomicU64,
    /// Channels released
    channels_closed: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new metrics registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_upserts(&self) {
        self.upserts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_writes_rejected(&self) {
        self.writes_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_broadcasts(&self) {
        self.broadcasts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_deliveries(&self, count: u64) {
        self.deliveries.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_dropped_deliveries(&self, count: u64) {
        self.dropped_deliveries.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_evictions(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_channels_opened(&self) {
        self.channels_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_channels_closed(&self) {
        self.channels_closed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn upserts(&self) -> u64 {
        self.upserts.load(Ordering::Relaxed)
    }

    pub fn broadcasts(&self) -> u64 {
        self.broadcasts.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Channels currently open (opened minus closed)
    pub fn active_channels(&self) -> u64 {
        let opened = self.channels_opened.load(Ordering::Relaxed);
        let closed = self.channels_closed.load(Ordering::Relaxed);
        opened.saturating_sub(closed)
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            upserts: self.upserts(),
            writes_rejected: self.writes_rejected.load(Ordering::Relaxed),
            broadcasts: self.broadcasts(),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            dropped_deliveries: self.dropped_deliveries.load(Ordering::Relaxed),
            evictions: self.evictions(),
            channels_opened: self.channels_opened.load(Ordering::Relaxed),
            channels_closed: self.channels_closed.load(Ordering::Relaxed),
            active_channels: self.active_channels(),
        }
    }
}

/// Serializable metrics copy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub upserts: u64,
    pub writes_rejected: u64,
    pub broadcasts: u64,
    pub deliveries: u64,
    pub dropped_deliveries: u64,
    pub evictions: u64,
    pub channels_opened: u64,
    pub channels_closed: u64,
    pub active_channels: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_new_registry_has_zero_values() {
        let registry = MetricsRegistry::new();
        assert_eq!(registry.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_active_channels() {
        let registry = MetricsRegistry::new();
        registry.increment_channels_opened();
        registry.increment_channels_opened();
        registry.increment_channels_closed();
        assert_eq!(registry.active_channels(), 1);
    }

    #[test]
    fn test_snapshot_serializes() {
        let registry = MetricsRegistry::new();
        registry.increment_upserts();
        registry.add_deliveries(3);

        let json = serde_json::to_value(registry.snapshot()).unwrap();
        assert_eq!(json["upserts"], 1);
        assert_eq!(json["deliveries"], 3);
    }

    #[test]
    fn test_thread_safety() {
        let registry = Arc::new(MetricsRegistry::new());
        let mut handles = vec![];

        for _ in 0..10 {
            let r = Arc::clone(&registry);
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    r.increment_broadcasts();
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(registry.broadcasts(), 1000);
    }
}
