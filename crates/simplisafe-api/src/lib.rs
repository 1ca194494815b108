// simplisafe-api: Async Rust client for the SimpliSafe cloud API (auth, REST, push events)

pub mod auth;
pub mod backoff;
pub mod credentials;
pub mod endpoints;
pub mod error;
pub mod executor;
pub mod rest;
pub mod transport;
pub mod websocket;

pub use auth::{AuthorizationCode, RefreshFailure, TokenManager};
pub use backoff::RetryPolicy;
pub use credentials::Credentials;
pub use endpoints::Endpoints;
pub use error::Error;
pub use executor::{ApiRequest, ApiResponse, RequestExecutor, RetryContext};
pub use rest::models;
pub use rest::{ClientConfig, SimpliSafeClient};
pub use transport::TransportConfig;
pub use websocket::{PushConnection, PushMessage};
