//! # HTTP Server
//!
//! Presence server: the write endpoint, the broadcast channel endpoint,
//! health and metrics, all backed by one shared [`PresenceRegistry`].

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use super::channel_routes::channel_routes;
use super::config::HttpServerConfig;
use super::location_routes::location_routes;
use super::observability_routes::{health_routes, observability_routes};
use crate::observability::{log_event, log_event_with_fields, Event};
use crate::presence::{PresenceRegistry, Sweeper};

/// HTTP server for presence sync
pub struct HttpServer {
    config: HttpServerConfig,
    registry: Arc<PresenceRegistry>,
    router: Router,
}

impl HttpServer {
    /// Create a server around an existing registry
    pub fn new(config: HttpServerConfig, registry: Arc<PresenceRegistry>) -> Self {
        let router = Self::build_router(&config, registry.clone());
        Self {
            config,
            registry,
            router,
        }
    }

    /// Create a server with a default registry
    pub fn with_config(config: HttpServerConfig) -> Self {
        Self::new(config, Arc::new(PresenceRegistry::default()))
    }

    /// Build the combined router with all endpoints
    pub fn build_router(config: &HttpServerConfig, registry: Arc<PresenceRegistry>) -> Router {
        let cors = if config.cors_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<_> = config
                .cors_origins
                .iter()
                .filter_map(|s| s.parse().ok())
                .collect();

            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        };

        let metrics = registry.metrics().clone();

        Router::new()
            .merge(health_routes())
            // Write endpoint and snapshot read
            .nest("/api", location_routes(registry.clone(), config.max_write_bytes))
            // Broadcast channel (WebSocket)
            .nest("/realtime", channel_routes(registry, config))
            .nest("/observability", observability_routes(metrics))
            .layer(cors)
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> String {
        self.config.socket_addr()
    }

    pub fn registry(&self) -> &Arc<PresenceRegistry> {
        &self.registry
    }

    /// Get the router (for testing)
    pub fn router(self) -> Router {
        self.router
    }

    /// Bind the configured address and serve until Ctrl-C
    pub async fn start(self) -> io::Result<()> {
        let addr: SocketAddr = self.config.socket_addr().parse().map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid socket address {}: {}", self.config.socket_addr(), e),
            )
        })?;

        let listener = TcpListener::bind(addr).await?;
        self.serve(listener, async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
    }

    /// Serve on an already bound listener until `shutdown` resolves.
    ///
    /// Runs the stale-record sweeper for the lifetime of the server.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local = listener.local_addr()?;
        let sweeper = Sweeper::spawn(self.registry.clone());

        log_event_with_fields(Event::Serving, &[("addr", &local.to_string())]);

        let result = axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown.await;
                log_event(Event::ShutdownStart);
            })
            .await;

        sweeper.shutdown().await;
        log_event(Event::ShutdownComplete);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[test]
    fn test_server_creation() {
        let server = HttpServer::with_config(HttpServerConfig::default());
        assert_eq!(server.socket_addr(), "0.0.0.0:54321");
    }

    #[test]
    fn test_server_with_custom_port() {
        let server = HttpServer::with_config(HttpServerConfig::with_port(8080));
        assert_eq!(server.socket_addr(), "0.0.0.0:8080");
    }

    #[tokio::test]
    async fn test_health_route() {
        let router = HttpServer::with_config(HttpServerConfig::default()).router();
        let response = router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_write_goes_to_shared_registry() {
        let registry = Arc::new(PresenceRegistry::default());
        let router = HttpServer::new(HttpServerConfig::default(), registry.clone()).router();

        let response = router
            .oneshot(
                Request::post("/api/location")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"email":"u1","latitude":1.0,"longitude":2.0,"alertLevel":"Low"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.metrics().upserts(), 1);
    }
}
