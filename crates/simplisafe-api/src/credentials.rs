// ── Session credentials ──
//
// Access/refresh token pair plus expiry. Serializable so callers can
// persist it between runs; secrets stay wrapped in `SecretString` and
// never reach `Debug` output.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Error;

const DEFAULT_EXPIRES_IN_SECS: u64 = 3600;

/// Tokens for one authenticated session.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(serialize_with = "expose", deserialize_with = "conceal")]
    pub access_token: SecretString,
    #[serde(serialize_with = "expose", deserialize_with = "conceal")]
    pub refresh_token: SecretString,
    pub expires_at: DateTime<Utc>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

impl Credentials {
    /// Build credentials from a token endpoint response.
    ///
    /// A response without `refresh_token` keeps `previous_refresh`; if there
    /// is neither, the response is invalid.
    pub(crate) fn from_token_response(
        resp: TokenResponse,
        previous_refresh: Option<&SecretString>,
        now: DateTime<Utc>,
    ) -> Result<Self, Error> {
        let access_token = resp
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::InvalidResponse {
                message: "token response carries no access_token".into(),
                body: String::new(),
            })?;

        let refresh_token = match resp.refresh_token.filter(|t| !t.is_empty()) {
            Some(token) => SecretString::from(token),
            None => previous_refresh.cloned().ok_or_else(|| Error::InvalidResponse {
                message: "token response carries no refresh_token".into(),
                body: String::new(),
            })?,
        };

        let expires_in = resp.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
        let expires_at = i64::try_from(expires_in)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .and_then(|d| now.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Ok(Self {
            access_token: SecretString::from(access_token),
            refresh_token,
            expires_at,
            token_type: resp.token_type.unwrap_or_else(default_token_type),
        })
    }

    /// `true` once `expires_at` has passed.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// `true` if the access token expires within `margin` of `now`.
    pub fn expires_within(&self, margin: Duration, now: DateTime<Utc>) -> bool {
        let margin = chrono::Duration::from_std(margin).unwrap_or(chrono::Duration::MAX);
        now.checked_add_signed(margin)
            .is_none_or(|deadline| deadline >= self.expires_at)
    }
}

impl PartialEq for Credentials {
    fn eq(&self, other: &Self) -> bool {
        self.access_token.expose_secret() == other.access_token.expose_secret()
            && self.refresh_token.expose_secret() == other.refresh_token.expose_secret()
            && self.expires_at == other.expires_at
            && self.token_type == other.token_type
    }
}

impl Eq for Credentials {}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &"[redacted]")
            .field("refresh_token", &"[redacted]")
            .field("expires_at", &self.expires_at)
            .field("token_type", &self.token_type)
            .finish()
    }
}

fn default_token_type() -> String {
    "Bearer".into()
}

fn expose<S: Serializer>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

fn conceal<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SecretString, D::Error> {
    String::deserialize(deserializer).map(SecretString::from)
}

// ── Token endpoint wire format ───────────────────────────────────────

/// Raw token endpoint body. Also carries the multi-factor fields the
/// password grant answers with.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(default)]
    pub mfa_token: Option<String>,
}
