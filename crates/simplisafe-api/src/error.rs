use thiserror::Error;

/// Top-level error type for the `simplisafe-api` crate.
///
/// Covers every failure mode across the token endpoint, the REST surface
/// and the push channel. `simplisafe-core` maps these into its own
/// `CoreError` without exposing reqwest or serde details.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The vendor rejected the credentials (bad code, revoked refresh
    /// token, or a request still unauthorized after one refresh).
    #[error("Invalid credentials: {message}")]
    InvalidCredentials { message: String },

    /// A token refresh failed for a reason other than rejection.
    /// Prior credentials are left untouched.
    #[error("Token refresh failed: {message}")]
    TokenRefresh {
        message: String,
        status: Option<u16>,
    },

    /// No credentials are held (never logged in, or logged out).
    #[error("Not authenticated -- log in or restore credentials first")]
    Unauthenticated,

    /// Multi-factor authorization was requested and must be confirmed
    /// out of band before logging in again.
    #[error("Pending authorization: {message}")]
    PendingAuthorization { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout).
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Building the TLS-capable HTTP client failed.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Vendor responses ────────────────────────────────────────────
    /// HTTP 429 after the retry budget ran out.
    #[error("Rate limited -- retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// HTTP 404 for the requested resource.
    #[error("Resource not found: {path}")]
    NotFound { path: String },

    /// The vendor refused a state-changing command.
    #[error("Command rejected (HTTP {status}): {message}")]
    CommandRejected { status: u16, message: String },

    /// The endpoint is not part of the customer's monitoring plan.
    #[error("Endpoint unavailable in plan: {path}")]
    EndpointUnavailable { path: String },

    /// Any other terminal non-2xx response.
    #[error("API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    /// The payload did not match the expected shape. Carries the raw body.
    #[error("Invalid response: {message}")]
    InvalidResponse { message: String, body: String },

    // ── Push channel ────────────────────────────────────────────────
    /// WebSocket connect, handshake, or read failure.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    // ── Usage ───────────────────────────────────────────────────────
    /// The requested operation is not valid for this system or device.
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),
}

impl Error {
    /// Returns `true` for authentication failures that a fresh login
    /// might resolve.
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidCredentials { .. }
                | Self::Unauthenticated
                | Self::PendingAuthorization { .. }
        )
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::RateLimited { .. } | Self::WebSocket(_) => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            Self::TokenRefresh { status, .. } => *status,
            Self::RateLimited { .. } => Some(429),
            Self::NotFound { .. } => Some(404),
            Self::CommandRejected { status, .. } | Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}
