//! Observable events for dangerwatch
//!
//! Every log line names one of these events. Events are explicit and typed.

use std::fmt;

use super::logger::Severity;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Server lifecycle
    /// Server startup begins
    ServerStart,
    /// Configuration loaded
    ConfigLoaded,
    /// Listening for requests
    Serving,
    /// Shutdown initiated
    ShutdownStart,
    /// Shutdown complete
    ShutdownComplete,

    // Registry
    /// Record inserted or replaced
    LocationUpserted,
    /// Write endpoint rejected a body
    WriteRejected,
    /// Record removed (disconnect or explicit)
    RecordEvicted,
    /// Sweeper removed stale records
    RecordsSwept,
    /// Sweeper pass failed
    SweepFailed,

    // Server-side channels
    /// Channel subscribed to broadcasts
    ChannelOpened,
    /// Channel released
    ChannelClosed,
    /// Push to a channel transport failed
    ChannelSendFailed,
    /// Channel upgrade refused for its origin
    ChannelRejected,

    // Client session
    /// Session started
    SessionStarted,
    /// Session torn down
    SessionEnded,
    /// No identity available (blocking)
    IdentityMissing,
    /// Position fetched
    PositionObtained,
    /// Position fetch failed
    GeolocationFailed,
    /// Write sent to the server
    PublishIssued,
    /// Write failed at transport level
    PublishFailed,
    /// Client channel connected
    ChannelConnected,
    /// Client channel transport dropped
    ChannelDisconnected,
    /// Unparseable push skipped
    ChannelMessageIgnored,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            // Server lifecycle
            Event::ServerStart => "DANGERWATCH_STARTUP_BEGIN",
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::Serving => "DANGERWATCH_SERVING",
            Event::ShutdownStart => "SHUTDOWN_START",
            Event::ShutdownComplete => "SHUTDOWN_COMPLETE",

            // Registry
            Event::LocationUpserted => "LOCATION_UPSERTED",
            Event::WriteRejected => "WRITE_REJECTED",
            Event::RecordEvicted => "RECORD_EVICTED",
            Event::RecordsSwept => "RECORDS_SWEPT",
            Event::SweepFailed => "SWEEP_FAILED",

            // Server-side channels
            Event::ChannelOpened => "CHANNEL_OPENED",
            Event::ChannelClosed => "CHANNEL_CLOSED",
            Event::ChannelSendFailed => "CHANNEL_SEND_FAILED",
            Event::ChannelRejected => "CHANNEL_REJECTED",

            // Client session
            Event::SessionStarted => "SESSION_STARTED",
            Event::SessionEnded => "SESSION_ENDED",
            Event::IdentityMissing => "IDENTITY_MISSING",
            Event::PositionObtained => "POSITION_OBTAINED",
            Event::GeolocationFailed => "GEOLOCATION_FAILED",
            Event::PublishIssued => "PUBLISH_ISSUED",
            Event::PublishFailed => "PUBLISH_FAILED",
            Event::ChannelConnected => "CHANNEL_CONNECTED",
            Event::ChannelDisconnected => "CHANNEL_DISCONNECTED",
            Event::ChannelMessageIgnored => "CHANNEL_MESSAGE_IGNORED",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::IdentityMissing | Event::SweepFailed => Severity::Error,
            Event::WriteRejected
            | Event::ChannelSendFailed
            | Event::ChannelRejected
            | Event::GeolocationFailed
            | Event::PublishFailed
            | Event::ChannelDisconnected
            | Event::ChannelMessageIgnored => Severity::Warn,
            Event::LocationUpserted | Event::PublishIssued => Severity::Trace,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
