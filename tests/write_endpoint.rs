//! Write Endpoint Tests
//!
//! Drives the full router in-process:
//! - Accepted writes upsert exactly one record per identity
//! - Rejected writes leave the registry untouched
//! - The snapshot read returns the broadcast payload shape

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use dangerwatch::http_server::{HttpServer, HttpServerConfig};
use dangerwatch::presence::{AlertLevel, Identity, PresenceRegistry};

fn app(registry: Arc<PresenceRegistry>) -> Router {
    HttpServer::new(HttpServerConfig::default(), registry).router()
}

fn write(email: &str, lat: f64, lng: f64, level: &str) -> Request<Body> {
    let body = serde_json::json!({
        "email": email,
        "latitude": lat,
        "longitude": lng,
        "alertLevel": level,
    });
    Request::post("/api/location")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// =============================================================================
// Upsert Semantics
// =============================================================================

/// A later write for the same identity replaces the earlier one.
#[tokio::test]
async fn test_alert_change_replaces_record() {
    let registry = Arc::new(PresenceRegistry::default());

    let first = app(registry.clone())
        .oneshot(write("u1", 40.0, -70.0, "Low"))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::ACCEPTED);

    let second = app(registry.clone())
        .oneshot(write("u1", 40.0, -70.0, "High"))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::ACCEPTED);

    let snapshot = registry.snapshot().unwrap();
    assert_eq!(snapshot.len(), 1);
    let record = snapshot.get(&Identity::new("u1").unwrap()).unwrap();
    assert_eq!(record.alert_level, AlertLevel::High);
}

/// Re-sending an identical write does not change the presence set.
#[tokio::test]
async fn test_identical_writes_are_idempotent() {
    let registry = Arc::new(PresenceRegistry::default());

    for _ in 0..3 {
        let response = app(registry.clone())
            .oneshot(write("u1", 1.5, 2.5, "Low"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    assert_eq!(registry.len(), 1);
    assert_eq!(registry.metrics().upserts(), 3);
}

/// Accepted writes carry no response body.
#[tokio::test]
async fn test_accepted_write_has_empty_body() {
    let registry = Arc::new(PresenceRegistry::default());
    let response = app(registry)
        .oneshot(write("u1", 0.0, 0.0, "Low"))
        .await
        .unwrap();

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(bytes.is_empty());
}

// =============================================================================
// Validation
// =============================================================================

#[tokio::test]
async fn test_out_of_range_coordinates_rejected() {
    let registry = Arc::new(PresenceRegistry::default());

    let response = app(registry.clone())
        .oneshot(write("u1", 95.0, 0.0, "Low"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["code"], "INVALID_COORDINATE");
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_unknown_alert_level_rejected() {
    let registry = Arc::new(PresenceRegistry::default());

    let response = app(registry.clone())
        .oneshot(write("u1", 1.0, 1.0, "Medium"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(registry.is_empty());
    assert_eq!(registry.metrics().snapshot().writes_rejected, 1);
}

// =============================================================================
// Snapshot Read
// =============================================================================

/// `GET /api/users` returns the same array an `update_users` push carries.
#[tokio::test]
async fn test_users_returns_full_set() {
    let registry = Arc::new(PresenceRegistry::default());
    app(registry.clone())
        .oneshot(write("u2", 2.0, 2.0, "High"))
        .await
        .unwrap();
    app(registry.clone())
        .oneshot(write("u1", 1.0, 1.0, "Low"))
        .await
        .unwrap();

    let response = app(registry)
        .oneshot(Request::get("/api/users").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let users = body_json(response).await;
    let users = users.as_array().unwrap();
    assert_eq!(users.len(), 2);
    assert!(users.iter().any(|u| u["email"] == "u1" && u["alertLevel"] == "Low"));
    assert!(users.iter().any(|u| u["email"] == "u2" && u["alertLevel"] == "High"));
}

#[tokio::test]
async fn test_users_empty_registry() {
    let response = app(Arc::new(PresenceRegistry::default()))
        .oneshot(Request::get("/api/users").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(body_json(response).await, serde_json::json!([]));
}

// =============================================================================
// CORS
// =============================================================================

#[tokio::test]
async fn test_configured_origin_is_allowed() {
    let response = app(Arc::new(PresenceRegistry::default()))
        .oneshot(
            Request::get("/health")
                .header("origin", "http://localhost:5173")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        response.headers().get("access-control-allow-origin").unwrap(),
        "http://localhost:5173"
    );
}
