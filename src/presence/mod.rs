//! # Presence Module
//!
//! Shared danger-level presence: the per-identity record model, the JSON
//! wire protocol and the server-side registry that fans full snapshots out
//! to every subscribed channel.
//!
//! ## Architecture
//!
//! - **Record**: identity, position, alert level, snapshot
//! - **Protocol**: write body and `update_users` push
//! - **Registry**: upsert + broadcast-on-mutation (authoritative)
//! - **Sweeper**: periodic stale-record eviction

pub mod errors;
pub mod protocol;
pub mod record;
pub mod registry;
pub mod sweeper;

pub use errors::{PresenceError, PresenceResult};
pub use protocol::{ChannelEvent, LocationUpdate, UPDATE_USERS_EVENT};
pub use record::{AlertLevel, Identity, Position, PresenceSnapshot, UserLocationRecord};
pub use registry::{
    BroadcastReport, PresenceConfig, PresenceRegistry, RegistrySubscription, SnapshotReceiver,
};
pub use sweeper::Sweeper;
