//! Location HTTP Routes
//!
//! The write endpoint (`POST /api/location`) and a read-only snapshot
//! endpoint (`GET /api/users`).

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::observability::{log_event_with_fields, Event};
use crate::presence::{ChannelEvent, LocationUpdate, PresenceError, PresenceRegistry};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error_response(status: StatusCode, err: &PresenceError) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
            code: err.code().to_string(),
        }),
    )
}

/// Caller mistakes are 400 and counted as rejected writes; anything else
/// is a 500
fn write_error(registry: &PresenceRegistry, err: PresenceError) -> ApiError {
    if !err.is_client_error() {
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, &err);
    }
    registry.metrics().increment_writes_rejected();
    log_event_with_fields(
        Event::WriteRejected,
        &[("code", err.code()), ("error", &err.to_string())],
    );
    error_response(StatusCode::BAD_REQUEST, &err)
}

/// Create location routes. Write bodies over `max_write_bytes` are
/// rejected as malformed.
pub fn location_routes(registry: Arc<PresenceRegistry>, max_write_bytes: usize) -> Router {
    Router::new()
        .route("/location", post(upsert_location_handler))
        .route("/users", get(list_users_handler))
        .layer(DefaultBodyLimit::max(max_write_bytes))
        .with_state(registry)
}

/// Accept one participant write. Responds before the broadcast reaches
/// anyone; the response carries no body.
///
/// `email` is used verbatim as the registry key. Values with surrounding
/// whitespace are rejected instead of trimmed, so the broadcast echoes
/// exactly what the client sent.
async fn upsert_location_handler(
    State(registry): State<Arc<PresenceRegistry>>,
    payload: Result<Json<LocationUpdate>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(update) = payload
        .map_err(|e| write_error(&registry, PresenceError::InvalidMessage(e.body_text())))?;
    let record = update.into_record().map_err(|e| write_error(&registry, e))?;

    registry.upsert(record).map_err(|e| write_error(&registry, e))?;

    Ok(StatusCode::ACCEPTED)
}

/// Current snapshot, same shape as the `update_users` payload
async fn list_users_handler(
    State(registry): State<Arc<PresenceRegistry>>,
) -> Result<Json<Vec<LocationUpdate>>, ApiError> {
    let snapshot = registry
        .snapshot()
        .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, &e))?;
    let ChannelEvent::UpdateUsers(users) = ChannelEvent::from_snapshot(&snapshot);
    Ok(Json(users))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn post_location(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/location")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_valid_write_is_accepted() {
        let registry = Arc::new(PresenceRegistry::default());
        let app = location_routes(registry.clone(), 4096);

        let response = app
            .oneshot(post_location(
                r#"{"email":"u1","latitude":40.0,"longitude":-70.0,"alertLevel":"High"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_email_is_rejected() {
        let registry = Arc::new(PresenceRegistry::default());
        let app = location_routes(registry.clone(), 4096);

        let response = app
            .oneshot(post_location(
                r#"{"email":"  ","latitude":40.0,"longitude":-70.0,"alertLevel":"Low"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(registry.is_empty());
        assert_eq!(registry.metrics().snapshot().writes_rejected, 1);
    }

    #[tokio::test]
    async fn test_padded_email_is_rejected_not_trimmed() {
        let registry = Arc::new(PresenceRegistry::default());
        let app = location_routes(registry.clone(), 4096);

        let response = app
            .oneshot(post_location(
                r#"{"email":"u1 ","latitude":40.0,"longitude":-70.0,"alertLevel":"Low"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(error["code"], "INVALID_IDENTITY");
        assert!(registry.is_empty());
    }

    #[test]
    fn test_internal_error_is_not_a_rejected_write() {
        let registry = PresenceRegistry::default();
        let (status, Json(body)) =
            write_error(&registry, PresenceError::Internal("Lock poisoned".into()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.code, "INTERNAL");
        assert_eq!(registry.metrics().snapshot().writes_rejected, 0);

        let (status, _) = write_error(&registry, PresenceError::InvalidIdentity);
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(registry.metrics().snapshot().writes_rejected, 1);
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let registry = Arc::new(PresenceRegistry::default());
        let app = location_routes(registry.clone(), 64);
        let email = "u".repeat(128);
        let body = format!(
            r#"{{"email":"{}","latitude":40.0,"longitude":-70.0,"alertLevel":"Low"}}"#,
            email
        );

        let response = app.oneshot(post_location(&body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(registry.is_empty());
        assert_eq!(registry.metrics().snapshot().writes_rejected, 1);
    }

    #[tokio::test]
    async fn test_malformed_body_is_rejected() {
        let registry = Arc::new(PresenceRegistry::default());
        let app = location_routes(registry.clone(), 4096);

        let response = app
            .oneshot(post_location(r#"{"email":"u1","alertLevel":"Medium"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(registry.is_empty());
    }
}
