// Token manager: authorization-code, password and refresh-token grants.
//
// Credentials live in a `watch` channel so every change is observable by
// callers that persist them. Refreshes are single-flight: the first caller
// spawns the exchange on its own task and parks a shared future in
// `inflight`; everyone else awaits a clone of it.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use futures::future::{BoxFuture, FutureExt, Shared};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tokio::sync::{oneshot, watch};
use tracing::{debug, info, warn};

use crate::credentials::{Credentials, TokenResponse};
use crate::endpoints::Endpoints;
use crate::error::Error;

const APP_VERSION: &str = "1.62.0";
const MFA_OOB_GRANT: &str = "http://simplisafe.com/oauth/grant-type/mfa-oob";

type SharedRefresh = Shared<BoxFuture<'static, Result<Credentials, RefreshFailure>>>;

/// Authorization code returned by the vendor's login page, together with
/// the PKCE verifier that produced its challenge.
#[derive(Clone)]
pub struct AuthorizationCode {
    pub code: String,
    pub code_verifier: SecretString,
}

impl std::fmt::Debug for AuthorizationCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationCode")
            .field("code", &"[redacted]")
            .finish_non_exhaustive()
    }
}

/// Outcome of a failed refresh, shared by every waiter on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshFailure {
    pub message: String,
    pub status: Option<u16>,
}

impl RefreshFailure {
    /// The vendor refused the refresh token itself.
    pub fn is_rejection(&self) -> bool {
        matches!(self.status, Some(400 | 401 | 403))
    }
}

impl From<RefreshFailure> for Error {
    fn from(failure: RefreshFailure) -> Self {
        if failure.is_rejection() {
            Error::InvalidCredentials {
                message: format!("refresh token rejected: {}", failure.message),
            }
        } else {
            Error::TokenRefresh {
                message: failure.message,
                status: failure.status,
            }
        }
    }
}

/// Owns the session's credentials and every exchange with the token endpoint.
///
/// Cheaply cloneable; all clones share one credential slot.
#[derive(Clone)]
pub struct TokenManager {
    inner: Arc<TokenInner>,
}

struct TokenInner {
    http: reqwest::Client,
    endpoints: Arc<Endpoints>,
    client_id: String,
    expiry_margin: Duration,
    credentials: watch::Sender<Option<Credentials>>,
    inflight: Mutex<Option<SharedRefresh>>,
}

impl TokenManager {
    pub fn new(
        http: reqwest::Client,
        endpoints: Arc<Endpoints>,
        client_id: impl Into<String>,
        expiry_margin: Duration,
    ) -> Self {
        let (credentials, _) = watch::channel(None);
        Self {
            inner: Arc::new(TokenInner {
                http,
                endpoints,
                client_id: client_id.into(),
                expiry_margin,
                credentials,
                inflight: Mutex::new(None),
            }),
        }
    }

    // ── Credential slot ──────────────────────────────────────────────

    /// Seed the session with previously persisted credentials.
    pub fn restore(&self, credentials: Credentials) {
        self.inner.credentials.send_replace(Some(credentials));
    }

    /// Drop the held credentials (logout).
    pub fn invalidate(&self) {
        self.inner.credentials.send_replace(None);
    }

    /// The credentials currently held.
    pub fn current(&self) -> Result<Credentials, Error> {
        self.inner
            .credentials
            .borrow()
            .clone()
            .ok_or(Error::Unauthenticated)
    }

    /// Receiver that observes every credential change (login, refresh,
    /// logout). Persist the value it yields to survive restarts.
    pub fn credentials_changed(&self) -> watch::Receiver<Option<Credentials>> {
        self.inner.credentials.subscribe()
    }

    // ── Grants ───────────────────────────────────────────────────────

    /// Exchange an authorization code for initial credentials.
    pub async fn authenticate(&self, code: AuthorizationCode) -> Result<Credentials, Error> {
        let body = json!({
            "grant_type": "authorization_code",
            "client_id": self.inner.client_id,
            "code": code.code,
            "code_verifier": code.code_verifier.expose_secret(),
            "redirect_uri": self.inner.endpoints.redirect_uri,
        });

        let (status, resp) = self.inner.post_token(&self.inner.endpoints.token_url, &body).await?;
        if !status.is_success() {
            return Err(Error::InvalidCredentials {
                message: describe_token_error(status.as_u16(), &resp),
            });
        }

        let creds = Credentials::from_token_response(resp, None, Utc::now())?;
        self.inner.credentials.send_replace(Some(creds.clone()));
        info!("authenticated with authorization code");
        Ok(creds)
    }

    /// Password grant with the multi-factor confirmation flow.
    ///
    /// When the vendor answers `mfa_required`, an out-of-band challenge is
    /// requested and [`Error::PendingAuthorization`] is returned; confirm
    /// the emailed link, then call this again.
    pub async fn login_with_password(
        &self,
        username: &str,
        password: &SecretString,
        device_id: &str,
    ) -> Result<Credentials, Error> {
        let body = json!({
            "grant_type": "password",
            "username": username,
            "password": password.expose_secret(),
            "client_id": self.inner.client_id,
            "device_id": device_id,
            "app_version": APP_VERSION,
            "scope": "offline_access",
        });

        let (status, resp) = self.inner.post_token(&self.inner.endpoints.token_url, &body).await?;

        if let Some(mfa_token) = resp.mfa_token.clone() {
            self.inner.request_mfa(&mfa_token).await?;
            return Err(Error::PendingAuthorization {
                message: format!(
                    "check your email for an authorization link, then log in again with client id {}",
                    self.inner.client_id
                ),
            });
        }

        if !status.is_success() {
            return Err(Error::InvalidCredentials {
                message: describe_token_error(status.as_u16(), &resp),
            });
        }

        let creds = Credentials::from_token_response(resp, None, Utc::now())?;
        self.inner.credentials.send_replace(Some(creds.clone()));
        info!(username, "authenticated with password grant");
        Ok(creds)
    }

    // ── Refresh ──────────────────────────────────────────────────────

    /// Refresh the access token. Concurrent callers share one exchange.
    ///
    /// On failure the previous credentials are kept.
    pub async fn refresh(&self) -> Result<Credentials, Error> {
        let shared = self.refresh_shared()?;
        shared.await.map_err(Error::from)
    }

    /// Access token for the next request, refreshed first if it expires
    /// within the safety margin.
    ///
    /// If that proactive refresh fails while the token is still valid, the
    /// current token is used and the failure is logged.
    pub async fn valid_access_token(&self) -> Result<SecretString, Error> {
        let creds = self.current()?;
        let now = Utc::now();
        if !creds.expires_within(self.inner.expiry_margin, now) {
            return Ok(creds.access_token);
        }

        debug!(expires_at = %creds.expires_at, "access token near expiry, refreshing");
        match self.refresh().await {
            Ok(fresh) => Ok(fresh.access_token),
            Err(e) if !creds.is_expired(Utc::now()) && !e.is_auth_error() => {
                warn!(error = %e, "proactive refresh failed, using current token");
                Ok(creds.access_token)
            }
            Err(e) => Err(e),
        }
    }

    /// Recover from a 401 on `rejected`.
    ///
    /// If another task already replaced that token, the newer one is
    /// returned without another exchange.
    pub async fn refresh_after_rejection(
        &self,
        rejected: &SecretString,
    ) -> Result<SecretString, Error> {
        let current = self.current()?;
        if current.access_token.expose_secret() != rejected.expose_secret() {
            debug!("rejected token already replaced, reusing newer token");
            return Ok(current.access_token);
        }
        info!("401 detected, refreshing access token");
        self.refresh().await.map(|c| c.access_token)
    }

    fn refresh_shared(&self) -> Result<SharedRefresh, Error> {
        let mut slot = self
            .inner
            .inflight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = slot.as_ref() {
            return Ok(existing.clone());
        }

        let refresh_token = self.current()?.refresh_token;
        let inner = Arc::clone(&self.inner);
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let outcome = inner.exchange_refresh_token(&refresh_token).await;
            if let Ok(ref creds) = outcome {
                inner.credentials.send_replace(Some(creds.clone()));
            }
            inner
                .inflight
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            let _ = tx.send(outcome);
        });

        let shared = async move {
            rx.await.unwrap_or_else(|_| {
                Err(RefreshFailure {
                    message: "refresh task ended without a result".into(),
                    status: None,
                })
            })
        }
        .boxed()
        .shared();

        *slot = Some(shared.clone());
        Ok(shared)
    }
}

impl TokenInner {
    async fn exchange_refresh_token(
        &self,
        refresh_token: &SecretString,
    ) -> Result<Credentials, RefreshFailure> {
        let body = json!({
            "grant_type": "refresh_token",
            "client_id": self.client_id,
            "refresh_token": refresh_token.expose_secret(),
        });

        let (status, resp) = self
            .post_token(&self.endpoints.token_url, &body)
            .await
            .map_err(|e| RefreshFailure {
                message: e.to_string(),
                status: e.status(),
            })?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "token refresh rejected");
            return Err(RefreshFailure {
                message: describe_token_error(status.as_u16(), &resp),
                status: Some(status.as_u16()),
            });
        }

        let creds = Credentials::from_token_response(resp, Some(refresh_token), Utc::now())
            .map_err(|e| RefreshFailure {
                message: e.to_string(),
                status: None,
            })?;
        debug!(expires_at = %creds.expires_at, "access token refreshed");
        Ok(creds)
    }

    async fn request_mfa(&self, mfa_token: &str) -> Result<(), Error> {
        let challenge = json!({
            "challenge_type": "oob",
            "client_id": self.client_id,
            "mfa_token": mfa_token,
        });
        let resp = self
            .http
            .post(&self.endpoints.mfa_challenge_url)
            .json(&challenge)
            .send()
            .await?;
        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(Error::InvalidCredentials {
                message: format!("MFA challenge failed (HTTP {}): {text}", status.as_u16()),
            });
        }

        let oob_code = serde_json::from_str::<serde_json::Value>(&text)
            .ok()
            .and_then(|v| v.get("oob_code").and_then(|c| c.as_str()).map(String::from))
            .ok_or_else(|| Error::InvalidResponse {
                message: "MFA challenge response carries no oob_code".into(),
                body: text.clone(),
            })?;

        // The grant answers with an error until the emailed link is
        // confirmed; only transport failures matter here.
        let grant = json!({
            "client_id": self.client_id,
            "grant_type": MFA_OOB_GRANT,
            "mfa_token": mfa_token,
            "oob_code": oob_code,
            "scope": "offline_access",
        });
        self.post_token(&self.endpoints.token_url, &grant).await?;
        info!("MFA challenge sent, awaiting out-of-band confirmation");
        Ok(())
    }

    async fn post_token(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<(reqwest::StatusCode, TokenResponse), Error> {
        let resp = self.http.post(url).json(body).send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if text.trim().is_empty() {
            return Ok((status, TokenResponse::default()));
        }

        match serde_json::from_str::<TokenResponse>(&text) {
            Ok(parsed) => Ok((status, parsed)),
            Err(_) if !status.is_success() => Ok((
                status,
                TokenResponse {
                    error_description: Some(text),
                    ..TokenResponse::default()
                },
            )),
            Err(e) => Err(Error::InvalidResponse {
                message: e.to_string(),
                body: text,
            }),
        }
    }
}

fn describe_token_error(status: u16, resp: &TokenResponse) -> String {
    match (&resp.error, &resp.error_description) {
        (Some(err), Some(desc)) => format!("HTTP {status}: {err}: {desc}"),
        (Some(err), None) => format!("HTTP {status}: {err}"),
        (None, Some(desc)) => format!("HTTP {status}: {desc}"),
        (None, None) => format!("HTTP {status}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_statuses_become_invalid_credentials() {
        let failure = RefreshFailure {
            message: "invalid_grant".into(),
            status: Some(401),
        };
        assert!(matches!(Error::from(failure), Error::InvalidCredentials { .. }));
    }

    #[test]
    fn other_failures_become_token_refresh() {
        let failure = RefreshFailure {
            message: "bad gateway".into(),
            status: Some(502),
        };
        assert!(matches!(
            Error::from(failure),
            Error::TokenRefresh {
                status: Some(502),
                ..
            }
        ));
    }

    #[test]
    fn token_error_description_is_readable() {
        let resp = TokenResponse {
            error: Some("invalid_grant".into()),
            error_description: Some("expired".into()),
            ..TokenResponse::default()
        };
        assert_eq!(describe_token_error(400, &resp), "HTTP 400: invalid_grant: expired");
    }

    #[tokio::test]
    async fn current_without_credentials_is_unauthenticated() {
        let manager = TokenManager::new(
            reqwest::Client::new(),
            Arc::new(Endpoints::default()),
            "client",
            Duration::from_secs(60),
        );
        assert!(matches!(manager.current(), Err(Error::Unauthenticated)));
        assert!(matches!(
            manager.valid_access_token().await,
            Err(Error::Unauthenticated)
        ));
    }
}
