//! # Session Errors
//!
//! Only `IdentityMissing` changes what the participant sees; every other
//! kind is logged and the session carries on.

use thiserror::Error;

use super::location::GeolocationError;

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Session errors
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    /// No authenticated identity; the feature is disabled
    #[error("User is not logged in")]
    IdentityMissing,

    /// Device could not produce a position
    #[error("Geolocation failed: {0}")]
    Geolocation(#[from] GeolocationError),

    /// Transport-level failure of a write
    #[error("Write failed: {0}")]
    WriteFailure(String),

    /// Channel transport dropped
    #[error("Channel disconnected: {0}")]
    ChannelDisconnect(String),

    /// A second channel was requested while one is open
    #[error("Session already owns an open channel")]
    ChannelAlreadyOpen,

    /// Operation on a session that has ended
    #[error("Session has ended")]
    SessionEnded,

    /// Invalid client configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl SessionError {
    /// True only for errors that replace the rendered view with a
    /// blocking error state
    pub fn is_blocking(&self) -> bool {
        matches!(self, SessionError::IdentityMissing)
    }
}
