// ── Runtime session configuration ──
//
// These types describe *how* an `Account` talks to the vendor. They carry
// tuning only and never touch disk; simplisafe-config builds a
// `SessionConfig` from a profile and hands it in.

use std::time::Duration;

use simplisafe_api::{ClientConfig, Endpoints, RetryPolicy, TransportConfig};

/// Where live events come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum EventSource {
    /// Vendor websocket push channel.
    #[default]
    Push,
    /// Poll the events endpoint every `poll_interval`.
    Poll,
    /// No live events; state changes only via refresh.
    Disabled,
}

/// Configuration for one account session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub endpoints: Endpoints,
    pub client_id: String,
    /// Stable identifier sent with password logins.
    pub device_id: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub expiry_margin: Duration,
    pub event_source: EventSource,
    pub poll_interval: Duration,
    /// Recent event ids remembered for duplicate suppression.
    pub dedup_capacity: usize,
    /// Periodic full refresh; `None` disables it.
    pub refresh_interval: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoints: Endpoints::default(),
            client_id: simplisafe_api::endpoints::DEFAULT_CLIENT_ID.into(),
            device_id: "simplisafe-rs".into(),
            timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
            expiry_margin: Duration::from_secs(60),
            event_source: EventSource::Push,
            poll_interval: Duration::from_secs(30),
            dedup_capacity: 1024,
            refresh_interval: None,
        }
    }
}

impl SessionConfig {
    /// The REST client configuration this session implies.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            endpoints: self.endpoints.clone(),
            client_id: self.client_id.clone(),
            transport: TransportConfig {
                timeout: self.timeout,
                ..TransportConfig::default()
            },
            retry: self.retry.clone(),
            expiry_margin: self.expiry_margin,
        }
    }
}
