//! # HTTP Server Module
//!
//! Axum server exposing the presence registry.
//!
//! # Endpoints
//!
//! - `/health` - Health check
//! - `POST /api/location` - Participant write
//! - `GET /api/users` - Current snapshot
//! - `/realtime/ws` - Broadcast channel (WebSocket)
//! - `/observability/*` - Metrics and monitoring

pub mod channel_routes;
pub mod config;
pub mod location_routes;
pub mod observability_routes;
pub mod server;

pub use config::HttpServerConfig;
pub use server::HttpServer;
