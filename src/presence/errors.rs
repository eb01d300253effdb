//! # Presence Errors
//!
//! Error types for the presence registry and its wire protocol.

use thiserror::Error;

/// Result type for presence operations
pub type PresenceResult<T> = Result<T, PresenceError>;

/// Presence errors
#[derive(Debug, Clone, Error)]
pub enum PresenceError {
    // ==================
    // Validation Errors
    // ==================
    /// Identity missing or blank
    #[error("Identity must not be empty")]
    InvalidIdentity,

    /// Identity with leading or trailing whitespace
    #[error("Identity must not have surrounding whitespace: {0:?}")]
    PaddedIdentity(String),

    /// Coordinate outside WGS84 bounds
    #[error("Invalid coordinate: {0}")]
    InvalidCoordinate(String),

    /// Unknown alert level
    #[error("Invalid alert level: {0}")]
    InvalidAlertLevel(String),

    /// Invalid message format
    #[error("Invalid message format: {0}")]
    InvalidMessage(String),

    // ==================
    // Subscription Errors
    // ==================
    /// Subscription not found
    #[error("Subscription not found: {0}")]
    SubscriptionNotFound(String),

    // ==================
    // Internal Errors
    // ==================
    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PresenceError {
    /// Returns true for errors caused by the caller's input
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PresenceError::InvalidIdentity
                | PresenceError::PaddedIdentity(_)
                | PresenceError::InvalidCoordinate(_)
                | PresenceError::InvalidAlertLevel(_)
                | PresenceError::InvalidMessage(_)
        )
    }

    /// Stable code for HTTP and channel error payloads
    pub fn code(&self) -> &'static str {
        match self {
            PresenceError::InvalidIdentity | PresenceError::PaddedIdentity(_) => "INVALID_IDENTITY",
            PresenceError::InvalidCoordinate(_) => "INVALID_COORDINATE",
            PresenceError::InvalidAlertLevel(_) => "INVALID_ALERT_LEVEL",
            PresenceError::InvalidMessage(_) => "INVALID_MESSAGE",
            PresenceError::SubscriptionNotFound(_) => "SUBSCRIPTION_NOT_FOUND",
            PresenceError::Internal(_) => "INTERNAL",
        }
    }
}
