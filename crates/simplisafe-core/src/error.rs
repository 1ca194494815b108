// ── Core error types ──
//
// User-facing errors from simplisafe-core. Consumers never see reqwest or
// serde failures directly; the `From<simplisafe_api::Error>` impl folds
// transport-layer errors into the domain taxonomy.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Authentication ───────────────────────────────────────────────
    #[error("Invalid credentials: {message}")]
    InvalidCredentials { message: String },

    #[error("Token refresh failed: {message}")]
    TokenRefresh { message: String },

    #[error("Not authenticated")]
    Unauthenticated,

    /// Multi-factor login is waiting on the emailed confirmation link.
    #[error("Authorization pending: {message}")]
    PendingAuthorization { message: String },

    // ── Connection ───────────────────────────────────────────────────
    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("Rate limited -- retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Push channel error: {message}")]
    WebSocket { message: String },

    /// The account session was closed.
    #[error("Account session is closed")]
    Disconnected,

    // ── Data ─────────────────────────────────────────────────────────
    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: String,
        identifier: String,
    },

    // ── Operation ────────────────────────────────────────────────────
    #[error("Command rejected: {message}")]
    CommandRejected { message: String },

    #[error("Endpoint not available on this plan: {path}")]
    EndpointUnavailable { path: String },

    #[error("Operation not supported: {operation}")]
    Unsupported { operation: String },

    #[error("PIN error: {message}")]
    Pin { message: String },

    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Errors only a new login can fix.
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidCredentials { .. } | Self::Unauthenticated | Self::PendingAuthorization { .. }
        )
    }

    pub(crate) fn not_found(entity_type: &str, identifier: impl ToString) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            identifier: identifier.to_string(),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<simplisafe_api::Error> for CoreError {
    fn from(err: simplisafe_api::Error) -> Self {
        use simplisafe_api::Error as Api;

        match err {
            Api::InvalidCredentials { message } => CoreError::InvalidCredentials { message },
            Api::TokenRefresh { message, .. } => CoreError::TokenRefresh { message },
            Api::Unauthenticated => CoreError::Unauthenticated,
            Api::PendingAuthorization { message } => CoreError::PendingAuthorization { message },
            Api::Transport(e) => CoreError::Transport {
                message: e.to_string(),
            },
            Api::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            Api::Tls(msg) => CoreError::Transport {
                message: format!("TLS error: {msg}"),
            },
            Api::RateLimited { retry_after_secs } => CoreError::RateLimited { retry_after_secs },
            Api::NotFound { path } => CoreError::NotFound {
                entity_type: "resource".into(),
                identifier: path,
            },
            Api::CommandRejected { status, message } => CoreError::CommandRejected {
                message: format!("{message} (HTTP {status})"),
            },
            Api::EndpointUnavailable { path } => CoreError::EndpointUnavailable { path },
            Api::Api { status, body } => CoreError::Api {
                status,
                message: body,
            },
            Api::InvalidResponse { message, body: _ } => CoreError::InvalidResponse { message },
            Api::WebSocket(message) => CoreError::WebSocket { message },
            Api::UnsupportedOperation(operation) => CoreError::Unsupported { operation },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_rejection_keeps_vendor_message() {
        let err: CoreError = simplisafe_api::Error::CommandRejected {
            status: 409,
            message: "Invalid PIN".into(),
        }
        .into();
        assert!(matches!(err, CoreError::CommandRejected { ref message } if message.contains("Invalid PIN")));
    }

    #[test]
    fn auth_errors_survive_conversion() {
        let err: CoreError = simplisafe_api::Error::Unauthenticated.into();
        assert!(err.is_auth_error());
        let err: CoreError = simplisafe_api::Error::RateLimited { retry_after_secs: 5 }.into();
        assert!(!err.is_auth_error());
    }
}
