//! Location producer
//!
//! One-shot position requests. No continuous watch and no automatic retry:
//! a failure is reported to the caller and nothing else changes.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::{self, BoxFuture, FutureExt};
use thiserror::Error;

use crate::presence::Position;

/// Why a position could not be produced
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeolocationError {
    #[error("permission denied")]
    PermissionDenied,

    #[error("timed out")]
    Timeout,

    #[error("position unavailable: {0}")]
    Unavailable(String),
}

/// Host geolocation capability
pub trait LocationProducer: Send + Sync {
    /// Request a single point-in-time position
    fn request_position(&self) -> BoxFuture<'static, Result<Position, GeolocationError>>;
}

/// Request a position, failing with `Timeout` after `limit`
pub async fn request_with_timeout(
    producer: &dyn LocationProducer,
    limit: Duration,
) -> Result<Position, GeolocationError> {
    match tokio::time::timeout(limit, producer.request_position()).await {
        Ok(result) => result,
        Err(_) => Err(GeolocationError::Timeout),
    }
}

/// Always answers with the configured outcome (CLI `--lat/--lng`)
#[derive(Debug, Clone)]
pub struct FixedLocation {
    outcome: Result<Position, GeolocationError>,
}

impl FixedLocation {
    pub fn new(position: Position) -> Self {
        Self {
            outcome: Ok(position),
        }
    }

    pub fn failing(error: GeolocationError) -> Self {
        Self {
            outcome: Err(error),
        }
    }
}

impl LocationProducer for FixedLocation {
    fn request_position(&self) -> BoxFuture<'static, Result<Position, GeolocationError>> {
        future::ready(self.outcome.clone()).boxed()
    }
}

/// Position that can be moved between requests, e.g. from an interactive
/// prompt. Unset means unavailable.
#[derive(Debug, Clone, Default)]
pub struct ManualLocation {
    current: Arc<Mutex<Option<Position>>>,
}

impl ManualLocation {
    pub fn new(initial: Option<Position>) -> Self {
        Self {
            current: Arc::new(Mutex::new(initial)),
        }
    }

    pub fn set(&self, position: Option<Position>) {
        if let Ok(mut current) = self.current.lock() {
            *current = position;
        }
    }
}

impl LocationProducer for ManualLocation {
    fn request_position(&self) -> BoxFuture<'static, Result<Position, GeolocationError>> {
        let outcome = match self.current.lock() {
            Ok(current) => current.ok_or_else(|| {
                GeolocationError::Unavailable("no position has been set".into())
            }),
            Err(_) => Err(GeolocationError::Unavailable("lock poisoned".into())),
        };
        future::ready(outcome).boxed()
    }
}
