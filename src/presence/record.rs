//! # Presence Records
//!
//! Data model shared by the registry, the wire protocol and client sessions.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::{PresenceError, PresenceResult};

/// Participant identity (an email address in practice).
///
/// Supplied by an external identity collaborator. Stored exactly as given:
/// blank values and values with surrounding whitespace are rejected rather
/// than normalized, so the key in the registry is the string the client sent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Create an identity, rejecting blank or padded values
    pub fn new(value: impl Into<String>) -> PresenceResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(PresenceError::InvalidIdentity);
        }
        if value.trim() != value {
            return Err(PresenceError::PaddedIdentity(value));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Danger level chosen by a participant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertLevel {
    #[default]
    Low,
    High,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Low => "Low",
            AlertLevel::High => "High",
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertLevel {
    type Err = PresenceError;

    /// Case-insensitive, so CLI input like `high` works
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(AlertLevel::Low),
            "high" => Ok(AlertLevel::High),
            other => Err(PresenceError::InvalidAlertLevel(other.to_string())),
        }
    }
}

/// A point-in-time geographic position in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

impl Position {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Check the coordinates are finite and inside WGS84 bounds
    pub fn validate(&self) -> PresenceResult<()> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(PresenceError::InvalidCoordinate(format!(
                "latitude {} out of range",
                self.latitude
            )));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(PresenceError::InvalidCoordinate(format!(
                "longitude {} out of range",
                self.longitude
            )));
        }
        Ok(())
    }
}

/// Last-known state of one participant. At most one per identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserLocationRecord {
    pub identity: Identity,
    pub position: Position,
    pub alert_level: AlertLevel,
    /// Time of the accepted write; drives TTL eviction
    pub updated_at: DateTime<Utc>,
}

impl UserLocationRecord {
    pub fn new(identity: Identity, position: Position, alert_level: AlertLevel) -> Self {
        Self {
            identity,
            position,
            alert_level,
            updated_at: Utc::now(),
        }
    }

    /// Same observable state, ignoring `updated_at`
    pub fn same_state(&self, other: &UserLocationRecord) -> bool {
        self.identity == other.identity
            && self.position == other.position
            && self.alert_level == other.alert_level
    }
}

/// Full registry contents at one instant, ordered by identity.
///
/// There is no partial or delta form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PresenceSnapshot {
    /// Monotonic broadcast revision assigned by the registry
    pub revision: u64,
    pub records: Vec<UserLocationRecord>,
}

impl PresenceSnapshot {
    pub fn new(revision: u64, records: Vec<UserLocationRecord>) -> Self {
        Self { revision, records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, identity: &Identity) -> Option<&UserLocationRecord> {
        self.records.iter().find(|r| &r.identity == identity)
    }
}
