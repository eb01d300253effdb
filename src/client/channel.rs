//! # Realtime Channel
//!
//! Client side of the persistent broadcast connection.
//!
//! A background task owns the WebSocket. It turns `update_users` pushes into
//! [`ChannelNotice::Snapshot`] values and reconnects after transport drops.
//! After a reconnect the server sends a fresh full snapshot; nothing is
//! resumed.
//!
//! [`ChannelSubscription`] is the scoped handle. `close()` sends a close
//! frame and joins the task at most once; `Drop` aborts the task on any
//! other exit path.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use crate::observability::{log_event_with_fields, Event};
use crate::presence::{ChannelEvent, Identity, LocationUpdate};

use super::errors::{SessionError, SessionResult};
use super::retry::RetryPolicy;

const NOTICE_BUFFER: usize = 64;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// What the channel reports to its session
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelNotice {
    Connected,
    /// Full presence set; replaces the previous one
    Snapshot(Vec<LocationUpdate>),
    Disconnected(String),
}

/// Where and how to connect
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// e.g. `ws://localhost:54321/realtime/ws`
    pub url: String,
    pub reconnect: RetryPolicy,
}

impl ChannelConfig {
    pub fn new(url: impl Into<String>, reconnect: RetryPolicy) -> Self {
        Self {
            url: url.into(),
            reconnect,
        }
    }

    /// Channel address with the identity bound as `?email=`
    pub fn url_for(&self, identity: &Identity) -> SessionResult<String> {
        let url = reqwest::Url::parse_with_params(&self.url, &[("email", identity.as_str())])
            .map_err(|e| SessionError::ConfigError(format!("channel url: {}", e)))?;
        match url.scheme() {
            "ws" | "wss" => Ok(url.to_string()),
            other => Err(SessionError::ConfigError(format!(
                "channel url scheme must be ws or wss, got {}",
                other
            ))),
        }
    }
}

/// Factory for channel subscriptions
pub struct RealtimeChannel;

impl RealtimeChannel {
    /// Start the connection task and return its scoped handle.
    ///
    /// Connecting happens in the background; the first notice is either
    /// `Connected` or `Disconnected`.
    pub fn subscribe(config: &ChannelConfig, identity: &Identity) -> SessionResult<ChannelSubscription> {
        let url = config.url_for(identity)?;
        let (notice_tx, notice_rx) = mpsc::channel(NOTICE_BUFFER);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(run_channel(
            url,
            config.reconnect.clone(),
            notice_tx,
            shutdown_rx,
        ));

        Ok(ChannelSubscription {
            notices: notice_rx,
            shutdown_tx,
            task: Some(task),
        })
    }
}

/// Scoped ownership of one channel connection
#[derive(Debug)]
pub struct ChannelSubscription {
    notices: mpsc::Receiver<ChannelNotice>,
    shutdown_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl ChannelSubscription {
    /// Next notice, or `None` once closed or the task has exited
    pub async fn next(&mut self) -> Option<ChannelNotice> {
        if self.task.is_none() {
            return None;
        }
        self.notices.recv().await
    }

    pub fn is_closed(&self) -> bool {
        self.task.is_none()
    }

    /// Close the transport and wait for the task to finish.
    ///
    /// Returns `true` for the call that actually closed the channel.
    pub async fn close(&mut self) -> bool {
        let Some(task) = self.task.take() else {
            return false;
        };
        let _ = self.shutdown_tx.send(true);
        self.notices.close();
        let _ = task.await;
        true
    }
}

impl Drop for ChannelSubscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            let _ = self.shutdown_tx.send(true);
            task.abort();
        }
    }
}

/// Resolves once shutdown has been requested or the handle is gone
async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

enum PumpExit {
    Shutdown,
    Dropped(String),
}

async fn run_channel(
    url: String,
    reconnect: RetryPolicy,
    notices: mpsc::Sender<ChannelNotice>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut failures = 0u32;

    loop {
        let connected = tokio::select! {
            result = connect_async(url.as_str()) => result,
            _ = shutdown_requested(&mut shutdown_rx) => return,
        };

        let reason = match connected {
            Ok((stream, _response)) => {
                failures = 0;
                log_event_with_fields(Event::ChannelConnected, &[("url", &url)]);
                if notices.send(ChannelNotice::Connected).await.is_err() {
                    return;
                }
                match pump(stream, &notices, &mut shutdown_rx).await {
                    PumpExit::Shutdown => return,
                    PumpExit::Dropped(reason) => reason,
                }
            }
            Err(e) => e.to_string(),
        };

        failures += 1;
        log_event_with_fields(
            Event::ChannelDisconnected,
            &[
                ("url", &url),
                ("error", &SessionError::ChannelDisconnect(reason.clone()).to_string()),
            ],
        );
        if notices
            .send(ChannelNotice::Disconnected(reason))
            .await
            .is_err()
        {
            return;
        }

        if !reconnect.should_retry(failures) {
            return;
        }
        let delay: Duration = reconnect.delay(failures.saturating_sub(1));
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown_requested(&mut shutdown_rx) => return,
        }
    }
}

/// Read pushes until the transport drops or shutdown is requested
async fn pump(
    stream: WsStream,
    notices: &mpsc::Sender<ChannelNotice>,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> PumpExit {
    let (mut sink, mut source) = stream.split();

    loop {
        tokio::select! {
            msg = source.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => match ChannelEvent::from_json(&text) {
                        Ok(event) => {
                            let ChannelEvent::UpdateUsers(users) = event;
                            if notices.send(ChannelNotice::Snapshot(users)).await.is_err() {
                                let _ = sink.send(Message::Close(None)).await;
                                return PumpExit::Shutdown;
                            }
                        }
                        // Unknown pushes are skipped, not fatal
                        Err(e) => log_event_with_fields(
                            Event::ChannelMessageIgnored,
                            &[("error", &e.to_string())],
                        ),
                    },
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = sink.send(Message::Pong(data)).await {
                            return PumpExit::Dropped(e.to_string());
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let reason = frame
                            .map(|f| f.reason.to_string())
                            .unwrap_or_else(|| "closed by server".to_string());
                        return PumpExit::Dropped(reason);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return PumpExit::Dropped(e.to_string()),
                    None => return PumpExit::Dropped("stream ended".to_string()),
                }
            }
            _ = shutdown_requested(shutdown_rx) => {
                let _ = sink.send(Message::Close(None)).await;
                let _ = sink.close().await;
                return PumpExit::Shutdown;
            }
        }
    }
}
