//! # Client Session
//!
//! Participant side of presence sync: position acquisition, alert
//! selection, update publishing, the broadcast channel, and the view
//! projected from received snapshots.
//!
//! # Components
//!
//! - `Session` - owns one participant's state machine and channel handle
//! - `LocationProducer` - asynchronous position source
//! - `UpdatePublisher` - fire-and-forget write to the registry
//! - `RealtimeChannel` - broadcast subscription with reconnect
//! - `PresenceView` - renderable projection of the presence set

pub mod alert;
pub mod channel;
pub mod errors;
pub mod identity;
pub mod location;
pub mod publisher;
pub mod retry;
pub mod session;
pub mod state;
pub mod view;

pub use alert::{indicator_color, AlertStateMachine};
pub use channel::{ChannelConfig, ChannelNotice, ChannelSubscription, RealtimeChannel};
pub use errors::{SessionError, SessionResult};
pub use identity::{IdentityProvider, StaticIdentity};
pub use location::{
    request_with_timeout, FixedLocation, GeolocationError, LocationProducer, ManualLocation,
};
pub use publisher::{HttpPublisher, MemoryPublisher, UpdatePublisher};
pub use retry::RetryPolicy;
pub use session::{Session, SessionOptions};
pub use state::{ConnectionStatus, Effect, LocalSessionState, Phase, SessionEvent};
pub use view::{DangerIndicator, Frame, Marker, PresenceView, Viewport};
