//! # Session
//!
//! Drives one participant's session: owns the state machine, the channel
//! handle, the view, and the producer/publisher collaborators.
//!
//! The channel handle belongs to the session and lives exactly as long as
//! it; there is no process-wide channel.

use std::sync::Arc;
use std::time::Duration;

use crate::observability::{log_event, log_event_with_fields, Event};
use crate::presence::{AlertLevel, LocationUpdate};

use super::channel::{ChannelConfig, ChannelNotice, ChannelSubscription, RealtimeChannel};
use super::errors::{SessionError, SessionResult};
use super::identity::IdentityProvider;
use super::location::{request_with_timeout, LocationProducer};
use super::publisher::UpdatePublisher;
use super::state::{ConnectionStatus, Effect, LocalSessionState, Phase, SessionEvent};
use super::view::{Frame, PresenceView};

/// Per-session settings
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub channel: ChannelConfig,
    pub geolocation_timeout: Duration,
}

pub struct Session {
    state: LocalSessionState,
    producer: Arc<dyn LocationProducer>,
    publisher: Arc<dyn UpdatePublisher>,
    options: SessionOptions,
    channel: Option<ChannelSubscription>,
    view: PresenceView,
    channel_closes: u32,
}

impl Session {
    /// Create a session for the current identity.
    ///
    /// Without an identity nothing else is attempted: no fetch, no write,
    /// no channel.
    pub fn new(
        identity: &dyn IdentityProvider,
        producer: Arc<dyn LocationProducer>,
        publisher: Arc<dyn UpdatePublisher>,
        options: SessionOptions,
    ) -> SessionResult<Self> {
        let Some(identity) = identity.identity() else {
            log_event(Event::IdentityMissing);
            return Err(SessionError::IdentityMissing);
        };

        Ok(Self {
            state: LocalSessionState::new(identity),
            producer,
            publisher,
            options,
            channel: None,
            view: PresenceView::new(),
            channel_closes: 0,
        })
    }

    pub fn state(&self) -> &LocalSessionState {
        &self.state
    }

    pub fn view(&self) -> &PresenceView {
        &self.view
    }

    /// Number of times the channel has actually been closed
    pub fn channel_closes(&self) -> u32 {
        self.channel_closes
    }

    pub fn render(&self) -> Frame {
        self.view
            .render(self.state.position(), self.state.alert_level())
    }

    /// Subscribe the channel and fetch the initial position.
    ///
    /// The channel connects in the background while the position is
    /// fetched, so either may complete first.
    pub async fn start(&mut self) -> SessionResult<()> {
        self.ensure_live()?;
        self.run(SessionEvent::SessionStarted).await?;
        log_event_with_fields(
            Event::SessionStarted,
            &[("identity", self.state.identity().as_str())],
        );
        self.run(SessionEvent::PositionRequested).await
    }

    /// Explicit re-fetch. Publishes even if the level is unchanged.
    pub async fn sos(&mut self) -> SessionResult<()> {
        self.ensure_live()?;
        self.run(SessionEvent::PositionRequested).await
    }

    /// Local selection; publishes only when a position is known
    pub async fn select_alert_level(&mut self, level: AlertLevel) -> SessionResult<()> {
        self.ensure_live()?;
        self.run(SessionEvent::AlertLevelChanged(level)).await
    }

    /// Wait for the next channel notice and apply it.
    ///
    /// Returns `None` when no channel is open or it has finished.
    pub async fn next_notice(&mut self) -> Option<ChannelNotice> {
        let notice = self.channel.as_mut()?.next().await?;
        self.apply_notice(&notice);
        Some(notice)
    }

    /// Apply a channel notice to state and view.
    ///
    /// A reconnect after a drop republishes the last known position, since
    /// the server may have evicted the record while the transport was down.
    pub fn apply_notice(&mut self, notice: &ChannelNotice) {
        if self.state.phase() == Phase::Ended {
            return;
        }
        let status = match notice {
            ChannelNotice::Connected => ConnectionStatus::Connected,
            ChannelNotice::Disconnected(_) => ConnectionStatus::Disconnected,
            ChannelNotice::Snapshot(users) => {
                self.apply_snapshot(users.clone());
                return;
            }
        };
        let effect = self.state.apply(SessionEvent::ConnectionChanged(status));
        if let Effect::Publish(update) = effect {
            self.publisher.publish(update);
        }
    }

    /// Replace the view's presence set. Returns `false` after teardown.
    pub fn apply_snapshot(&mut self, users: Vec<LocationUpdate>) -> bool {
        if self.state.phase() == Phase::Ended {
            return false;
        }
        self.view.apply_snapshot(users)
    }

    /// Tear the session down. The channel is closed once; later calls are
    /// no-ops. In-flight writes already spawned are left to finish.
    pub async fn end(&mut self) -> SessionResult<()> {
        self.run(SessionEvent::SessionEnded).await?;
        self.view.close();
        Ok(())
    }

    fn ensure_live(&self) -> SessionResult<()> {
        if self.state.phase() == Phase::Ended {
            return Err(SessionError::SessionEnded);
        }
        Ok(())
    }

    /// Apply an event and perform the effect chain it produces
    async fn run(&mut self, event: SessionEvent) -> SessionResult<()> {
        let mut next = Some(event);
        while let Some(event) = next.take() {
            match self.state.apply(event) {
                Effect::None => {}
                Effect::Subscribe => self.open_channel()?,
                Effect::RequestPosition => next = Some(self.fetch_position().await),
                Effect::Publish(update) => self.publisher.publish(update),
                Effect::Unsubscribe => self.close_channel().await,
            }
        }
        Ok(())
    }

    fn open_channel(&mut self) -> SessionResult<()> {
        if self.channel.is_some() {
            return Err(SessionError::ChannelAlreadyOpen);
        }
        self.channel = Some(RealtimeChannel::subscribe(
            &self.options.channel,
            self.state.identity(),
        )?);
        Ok(())
    }

    async fn close_channel(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            if channel.close().await {
                self.channel_closes += 1;
            }
        }
        log_event_with_fields(
            Event::SessionEnded,
            &[("identity", self.state.identity().as_str())],
        );
    }

    async fn fetch_position(&self) -> SessionEvent {
        match request_with_timeout(&*self.producer, self.options.geolocation_timeout).await {
            Ok(position) => {
                log_event_with_fields(
                    Event::PositionObtained,
                    &[
                        ("identity", self.state.identity().as_str()),
                        ("latitude", &position.latitude.to_string()),
                        ("longitude", &position.longitude.to_string()),
                    ],
                );
                SessionEvent::PositionObtained(position)
            }
            Err(e) => {
                log_event_with_fields(
                    Event::GeolocationFailed,
                    &[
                        ("identity", self.state.identity().as_str()),
                        ("error", &SessionError::from(e.clone()).to_string()),
                    ],
                );
                SessionEvent::PositionFailed(e)
            }
        }
    }
}
