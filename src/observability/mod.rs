//! Observability subsystem
//!
//! - Structured logging (JSON lines)
//! - Typed lifecycle and protocol events
//! - Atomic counters exposed at `/observability/metrics`
//!
//! Observability never fails the operation being observed.
//!
//! # Usage
//!
//! ```ignore
//! use dangerwatch::observability::{log_event_with_fields, Event};
//!
//! log_event_with_fields(Event::PublishFailed, &[("identity", "u1")]);
//! ```

mod events;
mod logger;
mod metrics;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};

/// Log an event at its own severity
pub fn log_event(event: Event) {
    Logger::log(event.severity(), event.as_str(), &[]);
}

/// Log an event with fields at its own severity
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_event() {
        // This just verifies no panic
        log_event(Event::ServerStart);
        log_event(Event::ShutdownComplete);
    }

    #[test]
    fn test_log_event_with_fields() {
        log_event_with_fields(Event::ConfigLoaded, &[("path", "/tmp/dangerwatch.json")]);
    }
}
