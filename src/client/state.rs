//! Session state machine
//!
//! Pure transitions over [`LocalSessionState`]. Every named event yields at
//! most one [`Effect`]; the session driver performs it. Once the session has
//! ended every event is absorbed, so late geolocation or channel results are
//! discarded without touching state.

use crate::presence::{AlertLevel, Identity, LocationUpdate, Position};

use super::alert::AlertStateMachine;
use super::location::GeolocationError;

/// Channel transport status as seen by the session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionStatus {
    #[default]
    Idle,
    Connecting,
    Connected,
    /// Transport dropped; the view is stale until the next snapshot.
    /// Reconnecting from here republishes the last known position.
    Disconnected,
    Closed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    Active,
    Ended,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    SessionStarted,
    /// Initial fetch or explicit SOS
    PositionRequested,
    PositionObtained(Position),
    PositionFailed(GeolocationError),
    AlertLevelChanged(AlertLevel),
    ConnectionChanged(ConnectionStatus),
    SessionEnded,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    None,
    Subscribe,
    RequestPosition,
    Publish(LocationUpdate),
    Unsubscribe,
}

/// State owned by exactly one session
#[derive(Debug, Clone)]
pub struct LocalSessionState {
    identity: Identity,
    position: Option<Position>,
    alert: AlertStateMachine,
    connection: ConnectionStatus,
    phase: Phase,
}

impl LocalSessionState {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            position: None,
            alert: AlertStateMachine::new(),
            connection: ConnectionStatus::Idle,
            phase: Phase::Idle,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn position(&self) -> Option<Position> {
        self.position
    }

    pub fn alert_level(&self) -> AlertLevel {
        self.alert.level()
    }

    pub fn connection(&self) -> ConnectionStatus {
        self.connection
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn publish_effect(&self, position: Position) -> Effect {
        Effect::Publish(LocationUpdate::new(
            &self.identity,
            position,
            self.alert.level(),
        ))
    }

    /// Apply one event and return the side effect it calls for
    pub fn apply(&mut self, event: SessionEvent) -> Effect {
        if self.phase == Phase::Ended {
            return Effect::None;
        }

        match event {
            SessionEvent::SessionStarted => {
                if self.phase != Phase::Idle {
                    return Effect::None;
                }
                self.phase = Phase::Active;
                self.connection = ConnectionStatus::Connecting;
                Effect::Subscribe
            }
            SessionEvent::PositionRequested => {
                if self.phase == Phase::Active {
                    Effect::RequestPosition
                } else {
                    Effect::None
                }
            }
            SessionEvent::PositionObtained(position) => {
                if self.phase != Phase::Active {
                    return Effect::None;
                }
                self.position = Some(position);
                self.publish_effect(position)
            }
            // Last known position is kept; nothing is published
            SessionEvent::PositionFailed(_) => Effect::None,
            SessionEvent::AlertLevelChanged(level) => {
                self.alert.select(level);
                match (self.phase, self.position) {
                    (Phase::Active, Some(position)) => self.publish_effect(position),
                    _ => Effect::None,
                }
            }
            SessionEvent::ConnectionChanged(status) => {
                let previous = std::mem::replace(&mut self.connection, status);
                // The server may have evicted this identity while the
                // transport was down; restate the last known position
                match (previous, status, self.phase, self.position) {
                    (
                        ConnectionStatus::Disconnected,
                        ConnectionStatus::Connected,
                        Phase::Active,
                        Some(position),
                    ) => self.publish_effect(position),
                    _ => Effect::None,
                }
            }
            SessionEvent::SessionEnded => {
                let was_active = self.phase == Phase::Active;
                self.phase = Phase::Ended;
                self.connection = ConnectionStatus::Closed;
                if was_active {
                    Effect::Unsubscribe
                } else {
                    Effect::None
                }
            }
        }
    }
}
