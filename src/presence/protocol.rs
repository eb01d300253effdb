//! # Wire Protocol
//!
//! JSON shapes exchanged between sessions and the server:
//!
//! - `POST /api/location` body: [`LocationUpdate`]
//! - channel push: [`ChannelEvent`], e.g.
//!   `{"event":"update_users","payload":[{"email":"u2","latitude":1.0,...}]}`

use serde::{Deserialize, Serialize};

use super::errors::{PresenceError, PresenceResult};
use super::record::{AlertLevel, Identity, Position, PresenceSnapshot, UserLocationRecord};

/// Logical name of the full-snapshot broadcast
pub const UPDATE_USERS_EVENT: &str = "update_users";

/// One write from a session. Also the per-user element of a broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationUpdate {
    pub email: String,
    pub latitude: f64,
    pub longitude: f64,
    pub alert_level: AlertLevel,
}

impl LocationUpdate {
    pub fn new(identity: &Identity, position: Position, alert_level: AlertLevel) -> Self {
        Self {
            email: identity.as_str().to_string(),
            latitude: position.latitude,
            longitude: position.longitude,
            alert_level,
        }
    }

    pub fn position(&self) -> Position {
        Position::new(self.latitude, self.longitude)
    }

    /// Validate and convert into a registry record.
    ///
    /// Partial records never reach the registry: blank identity or bad
    /// coordinates are rejected here.
    pub fn into_record(self) -> PresenceResult<UserLocationRecord> {
        let identity = Identity::new(self.email)?;
        let position = Position::new(self.latitude, self.longitude);
        position.validate()?;
        Ok(UserLocationRecord::new(identity, position, self.alert_level))
    }
}

impl From<&UserLocationRecord> for LocationUpdate {
    fn from(record: &UserLocationRecord) -> Self {
        LocationUpdate::new(&record.identity, record.position, record.alert_level)
    }
}

/// Server-to-client push over the channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload")]
pub enum ChannelEvent {
    /// Entire current registry contents
    #[serde(rename = "update_users")]
    UpdateUsers(Vec<LocationUpdate>),
}

impl ChannelEvent {
    pub fn from_snapshot(snapshot: &PresenceSnapshot) -> Self {
        ChannelEvent::UpdateUsers(snapshot.records.iter().map(LocationUpdate::from).collect())
    }

    pub fn to_json(&self) -> PresenceResult<String> {
        serde_json::to_string(self).map_err(|e| PresenceError::Internal(e.to_string()))
    }

    pub fn from_json(text: &str) -> PresenceResult<Self> {
        serde_json::from_str(text).map_err(|e| PresenceError::InvalidMessage(e.to_string()))
    }

    /// Users carried by the event
    pub fn users(&self) -> &[LocationUpdate] {
        match self {
            ChannelEvent::UpdateUsers(users) => users,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_location_update_wire_shape() {
        let update = LocationUpdate::new(
            &Identity::new("u1").unwrap(),
            Position::new(40.0, -70.0),
            AlertLevel::Low,
        );
        let value = serde_json::to_value(&update).unwrap();
        assert_eq!(
            value,
            json!({"email": "u1", "latitude": 40.0, "longitude": -70.0, "alertLevel": "Low"})
        );
    }

    #[test]
    fn test_rejects_unknown_alert_level() {
        let body = r#"{"email":"u1","latitude":1,"longitude":2,"alertLevel":"Medium"}"#;
        assert!(serde_json::from_str::<LocationUpdate>(body).is_err());
    }

    #[test]
    fn test_into_record_validates() {
        let blank = LocationUpdate {
            email: " ".into(),
            latitude: 1.0,
            longitude: 2.0,
            alert_level: AlertLevel::High,
        };
        assert!(matches!(
            blank.into_record(),
            Err(PresenceError::InvalidIdentity)
        ));

        let far = LocationUpdate {
            email: "u1".into(),
            latitude: 123.0,
            longitude: 2.0,
            alert_level: AlertLevel::High,
        };
        assert!(matches!(
            far.into_record(),
            Err(PresenceError::InvalidCoordinate(_))
        ));
    }

    #[test]
    fn test_channel_event_parse() {
        let text = r#"{"event":"update_users","payload":[{"email":"u2","latitude":1,"longitude":2,"alertLevel":"High"}]}"#;
        let event = ChannelEvent::from_json(text).unwrap();
        let users = event.users();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].email, "u2");
        assert_eq!(users[0].alert_level, AlertLevel::High);
    }

    #[test]
    fn test_channel_event_serialize_uses_event_name() {
        let event = ChannelEvent::UpdateUsers(Vec::new());
        let json = event.to_json().unwrap();
        assert!(json.contains(UPDATE_USERS_EVENT));
        assert!(json.contains("\"payload\":[]"));
    }
}
