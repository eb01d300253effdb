//! Channel Routes and WebSocket Handler
//!
//! `GET /realtime/ws[?email=<identity>]` upgrades to a broadcast channel.
//! Each connection holds one registry subscription and forwards every
//! snapshot as an `update_users` push. The first push is the snapshot
//! current at subscribe time. Queued snapshots are coalesced, so a slow
//! connection may skip intermediate states but always ends on the latest.
//!
//! Browser upgrades whose `Origin` is not in the configured list get 403.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;

use super::config::HttpServerConfig;
use crate::observability::{log_event_with_fields, Event};
use crate::presence::{ChannelEvent, Identity, PresenceRegistry, RegistrySubscription};

/// Query parameters of the channel endpoint
#[derive(Debug, Default, Deserialize)]
pub struct ChannelQuery {
    /// Binds the channel to an identity for disconnect eviction
    #[serde(default)]
    pub email: Option<String>,
}

impl ChannelQuery {
    /// Blank values are treated as an anonymous channel
    pub fn identity(&self) -> Option<Identity> {
        self.email.as_deref().and_then(|e| Identity::new(e).ok())
    }
}

#[derive(Clone)]
struct ChannelState {
    registry: Arc<PresenceRegistry>,
    config: Arc<HttpServerConfig>,
}

/// Create channel routes
pub fn channel_routes(registry: Arc<PresenceRegistry>, config: &HttpServerConfig) -> Router {
    Router::new()
        .route("/ws", get(websocket_handler))
        .with_state(ChannelState {
            registry,
            config: Arc::new(config.clone()),
        })
}

async fn websocket_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    Query(query): Query<ChannelQuery>,
    State(state): State<ChannelState>,
) -> Response {
    // An unreadable Origin never matches the list
    let origin = headers
        .get(header::ORIGIN)
        .map(|value| value.to_str().unwrap_or_default());
    if !state.config.allows_channel_origin(origin) {
        log_event_with_fields(
            Event::ChannelRejected,
            &[("origin", origin.unwrap_or(""))],
        );
        return StatusCode::FORBIDDEN.into_response();
    }

    let identity = query.identity();
    let registry = state.registry;
    ws.on_upgrade(move |socket| handle_websocket(socket, registry, identity))
}

/// Releases the registry subscription however the connection ends
struct SubscriptionGuard {
    registry: Arc<PresenceRegistry>,
    id: String,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        match self.registry.unsubscribe(&self.id) {
            Ok(report) => log_event_with_fields(
                Event::ChannelClosed,
                &[
                    ("subscription_id", &self.id),
                    ("evicted", if report.is_some() { "true" } else { "false" }),
                ],
            ),
            // Already pruned by the sweeper
            Err(e) => log_event_with_fields(
                Event::ChannelClosed,
                &[("subscription_id", &self.id), ("error", &e.to_string())],
            ),
        }
    }
}

async fn handle_websocket(
    socket: WebSocket,
    registry: Arc<PresenceRegistry>,
    identity: Option<Identity>,
) {
    let RegistrySubscription {
        id,
        identity,
        mut receiver,
    } = match registry.subscribe(identity) {
        Ok(subscription) => subscription,
        Err(e) => {
            log_event_with_fields(Event::ChannelSendFailed, &[("error", &e.to_string())]);
            return;
        }
    };
    let _guard = SubscriptionGuard {
        registry: registry.clone(),
        id: id.clone(),
    };

    log_event_with_fields(
        Event::ChannelOpened,
        &[
            ("subscription_id", &id),
            ("identity", identity.as_ref().map(|i| i.as_str()).unwrap_or("")),
        ],
    );

    let (mut sender, mut inbound) = socket.split();

    loop {
        tokio::select! {
            snapshot = receiver.recv() => {
                // Registry dropped this subscriber
                let Some(mut snapshot) = snapshot else { break };
                // Only the newest queued snapshot matters
                while let Ok(next) = receiver.try_recv() {
                    snapshot = next;
                }
                // A full queue dropped a broadcast; catch up so this channel
                // still converges when writes stop
                if snapshot.revision < registry.revision() {
                    if let Ok(current) = registry.snapshot() {
                        snapshot = Arc::new(current);
                    }
                }
                let json = match ChannelEvent::from_snapshot(&snapshot).to_json() {
                    Ok(json) => json,
                    Err(e) => {
                        log_event_with_fields(
                            Event::ChannelSendFailed,
                            &[("subscription_id", &id), ("error", &e.to_string())],
                        );
                        continue;
                    }
                };
                if let Err(e) = sender.send(Message::Text(json)).await {
                    log_event_with_fields(
                        Event::ChannelSendFailed,
                        &[("subscription_id", &id), ("error", &e.to_string())],
                    );
                    break;
                }
            }
            msg = inbound.next() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sender.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    // The channel is push-only
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    let _ = sender.close().await;
}
