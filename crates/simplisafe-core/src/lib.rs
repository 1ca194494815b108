// simplisafe-core: Session facade, reactive cache and live events over simplisafe-api.

pub mod account;
pub mod config;
mod convert;
pub mod error;
pub mod model;
pub mod pins;
mod refresher;
pub mod store;
pub mod stream;
pub mod subscriber;

// ── Primary re-exports ──────────────────────────────────────────────
pub use account::Account;
pub use config::{EventSource, SessionConfig};
pub use error::CoreError;
pub use store::DataStore;
pub use stream::{EntityStream, Snapshot};
pub use subscriber::{ConnectionState, EventListener, ListenerError, ListenerId};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    Address, AlarmState, Camera, Device, DeviceId, DeviceType, Event, EventType, LockState,
    Notification, ReportedState, System, SystemId, SystemVersion,
};

// API types that appear in this crate's public signatures.
pub use simplisafe_api::models::CommandAck;
pub use simplisafe_api::{AuthorizationCode, Credentials, Endpoints, RetryPolicy};
