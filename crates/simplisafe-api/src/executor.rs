// Request executor: bearer auth, retry/backoff, and status translation.
//
// Every REST call funnels through `RequestExecutor::execute`. One call may
// span several attempts; each attempt fetches a fresh bearer token, and a
// 401 triggers exactly one reactive refresh before giving up.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Method, StatusCode};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::auth::TokenManager;
use crate::backoff::{RetryPolicy, calculate_backoff};
use crate::endpoints::Endpoints;
use crate::error::Error;

// ── Request / response types ─────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Surface {
    Api,
    Media,
}

/// A single logical REST call.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<serde_json::Value>,
    surface: Surface,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            surface: Surface::Api,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Append a query parameter.
    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_owned(), value.to_string()));
        self
    }

    /// Attach a JSON body.
    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Resolve the path against the media host instead of the REST root.
    pub fn on_media(mut self) -> Self {
        self.surface = Surface::Media;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// A successful (2xx) response plus the retry history behind it.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Bytes,
    /// HTTP attempts made, including the successful one.
    pub attempts: u32,
    /// Sum of backoff delays slept between attempts.
    pub total_delay: Duration,
}

impl ApiResponse {
    /// Decode the body as JSON. Shape mismatches become
    /// [`Error::InvalidResponse`] carrying the raw body.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        serde_json::from_slice(&self.body).map_err(|e| Error::InvalidResponse {
            message: e.to_string(),
            body: String::from_utf8_lossy(&self.body).into_owned(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.body.iter().all(u8::is_ascii_whitespace)
    }
}

/// Per-call retry bookkeeping. Created for each `execute`, dropped on
/// success or terminal failure.
#[derive(Debug, Default)]
pub struct RetryContext {
    /// HTTP attempts made so far.
    pub attempt: u32,
    /// Wall time since the call started.
    pub elapsed: Duration,
    /// Sum of backoff delays slept.
    pub total_delay: Duration,
    /// Most recent failure, rendered.
    pub last_error: Option<String>,
    /// Whether the one reactive refresh has been spent.
    pub auth_retried: bool,
}

impl RetryContext {
    /// Failed attempts that count against the retry budget. The single
    /// post-refresh retry is free.
    fn counted_failures(&self) -> u32 {
        self.attempt.saturating_sub(u32::from(self.auth_retried))
    }
}

// ── Executor ─────────────────────────────────────────────────────────

/// Wraps outbound calls with bearer auth, bounded exponential backoff,
/// rate-limit handling and uniform error translation.
#[derive(Clone)]
pub struct RequestExecutor {
    http: reqwest::Client,
    endpoints: Arc<Endpoints>,
    tokens: TokenManager,
    policy: RetryPolicy,
}

enum Attempt {
    Done(ApiResponse),
    Unauthorized,
    Retry { error: Error, hint: Option<Duration> },
}

impl RequestExecutor {
    pub fn new(
        http: reqwest::Client,
        endpoints: Arc<Endpoints>,
        tokens: TokenManager,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            http,
            endpoints,
            tokens,
            policy,
        }
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Execute `request`, retrying transient failures per the policy.
    pub async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, Error> {
        let url = match request.surface {
            Surface::Api => self.endpoints.api_url(&request.path)?,
            Surface::Media => self.endpoints.media_url(&request.path)?,
        };

        let started = Instant::now();
        let mut ctx = RetryContext::default();

        loop {
            ctx.attempt += 1;
            let token = self.tokens.valid_access_token().await?;

            let outcome = self.attempt(request, url.clone(), token.expose_secret(), &ctx).await?;
            ctx.elapsed = started.elapsed();

            let (error, hint) = match outcome {
                Attempt::Done(response) => return Ok(response),
                Attempt::Unauthorized => {
                    if ctx.auth_retried {
                        return Err(Error::InvalidCredentials {
                            message: format!(
                                "{} {} still unauthorized after token refresh",
                                request.method, request.path
                            ),
                        });
                    }
                    ctx.auth_retried = true;
                    self.tokens.refresh_after_rejection(&token).await?;
                    continue;
                }
                Attempt::Retry { error, hint } => (error, hint),
            };

            ctx.last_error = Some(error.to_string());
            if ctx.counted_failures() >= self.policy.max_attempts {
                debug!(attempts = ctx.attempt, path = %request.path, "retry budget exhausted");
                return Err(error);
            }

            let delay = hint.unwrap_or_else(|| calculate_backoff(ctx.counted_failures() - 1, &self.policy));
            if ctx.elapsed + delay > self.policy.max_elapsed {
                debug!(
                    elapsed_ms = duration_ms(ctx.elapsed),
                    delay_ms = duration_ms(delay),
                    "retry would exceed max elapsed time"
                );
                return Err(error);
            }

            warn!(
                error = %error,
                attempt = ctx.attempt,
                delay_ms = duration_ms(delay),
                path = %request.path,
                "request failed, retrying"
            );
            tokio::time::sleep(delay).await;
            ctx.total_delay += delay;
        }
    }

    async fn attempt(
        &self,
        request: &ApiRequest,
        url: Url,
        token: &str,
        ctx: &RetryContext,
    ) -> Result<Attempt, Error> {
        debug!(method = %request.method, %url, attempt = ctx.attempt, "sending request");

        let mut builder = self
            .http
            .request(request.method.clone(), url)
            .bearer_auth(token);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        let resp = match builder.send().await {
            Ok(resp) => resp,
            Err(e) if e.is_timeout() || e.is_connect() || e.is_request() => {
                return Ok(Attempt::Retry {
                    error: Error::Transport(e),
                    hint: None,
                });
            }
            Err(e) => return Err(Error::Transport(e)),
        };

        let status = resp.status();
        let retry_after = parse_retry_after(resp.headers(), Utc::now());
        let body = match resp.bytes().await {
            Ok(body) => body,
            Err(e) => {
                return Ok(Attempt::Retry {
                    error: Error::Transport(e),
                    hint: None,
                });
            }
        };

        if status.is_success() {
            return Ok(Attempt::Done(ApiResponse {
                status: status.as_u16(),
                body,
                attempts: ctx.attempt,
                total_delay: ctx.total_delay,
            }));
        }

        debug!(status = status.as_u16(), path = %request.path, "non-success response");

        if status == StatusCode::UNAUTHORIZED {
            return Ok(Attempt::Unauthorized);
        }

        let error = classify_status(status, &body, &request.path, retry_after);
        if error.is_transient() {
            Ok(Attempt::Retry {
                error,
                hint: retry_after,
            })
        } else {
            Err(error)
        }
    }
}

// ── Status translation ───────────────────────────────────────────────

/// Map a terminal non-2xx response onto the error taxonomy.
pub(crate) fn classify_status(
    status: StatusCode,
    body: &[u8],
    path: &str,
    retry_after: Option<Duration>,
) -> Error {
    let text = String::from_utf8_lossy(body).into_owned();

    if is_no_remote_management(body) {
        return Error::EndpointUnavailable {
            path: path.to_owned(),
        };
    }

    match status.as_u16() {
        404 => Error::NotFound {
            path: path.to_owned(),
        },
        409 | 422 => Error::CommandRejected {
            status: status.as_u16(),
            message: rejection_reason(body).unwrap_or(text),
        },
        429 => Error::RateLimited {
            retry_after_secs: retry_after.map_or(0, |d| d.as_secs()),
        },
        code => Error::Api {
            status: code,
            body: text,
        },
    }
}

fn is_no_remote_management(body: &[u8]) -> bool {
    serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("type").and_then(|t| t.as_str()).map(|t| t == "NoRemoteManagement"))
        .unwrap_or(false)
}

fn rejection_reason(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    ["reason", "message", "error"]
        .iter()
        .find_map(|k| value.get(*k).and_then(|v| v.as_str()).map(String::from))
}

/// Parse `Retry-After` as delta-seconds or an HTTP date.
pub(crate) fn parse_retry_after(headers: &HeaderMap, now: DateTime<Utc>) -> Option<Duration> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();

    if let Ok(secs) = raw.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    let at = DateTime::parse_from_rfc2822(raw).ok()?.with_timezone(&Utc);
    Some((at - now).to_std().unwrap_or(Duration::ZERO))
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn retry_after_delta_seconds() {
        let parsed = parse_retry_after(&headers_with("7"), Utc::now());
        assert_eq!(parsed, Some(Duration::from_secs(7)));
    }

    #[test]
    fn retry_after_http_date() {
        let now: DateTime<Utc> = "2026-10-21T07:28:00Z".parse().unwrap();
        let parsed = parse_retry_after(&headers_with("Wed, 21 Oct 2026 07:28:30 GMT"), now);
        assert_eq!(parsed, Some(Duration::from_secs(30)));
    }

    #[test]
    fn retry_after_in_the_past_is_zero() {
        let now: DateTime<Utc> = "2026-10-21T07:29:00Z".parse().unwrap();
        let parsed = parse_retry_after(&headers_with("Wed, 21 Oct 2026 07:28:30 GMT"), now);
        assert_eq!(parsed, Some(Duration::ZERO));
    }

    #[test]
    fn retry_after_garbage_is_ignored() {
        assert_eq!(parse_retry_after(&headers_with("soon"), Utc::now()), None);
        assert_eq!(parse_retry_after(&HeaderMap::new(), Utc::now()), None);
    }

    #[test]
    fn classify_maps_statuses() {
        let nf = classify_status(StatusCode::NOT_FOUND, b"", "x", None);
        assert!(matches!(nf, Error::NotFound { .. }));

        let conflict = classify_status(StatusCode::CONFLICT, br#"{"reason":"busy"}"#, "x", None);
        assert!(matches!(
            conflict,
            Error::CommandRejected { status: 409, ref message } if message == "busy"
        ));

        let limited = classify_status(
            StatusCode::TOO_MANY_REQUESTS,
            b"",
            "x",
            Some(Duration::from_secs(12)),
        );
        assert!(matches!(limited, Error::RateLimited { retry_after_secs: 12 }));

        let server = classify_status(StatusCode::BAD_GATEWAY, b"oops", "x", None);
        assert!(matches!(server, Error::Api { status: 502, .. }));
    }

    #[test]
    fn no_remote_management_is_endpoint_unavailable() {
        let err = classify_status(
            StatusCode::FORBIDDEN,
            br#"{"type":"NoRemoteManagement","message":"upgrade"}"#,
            "ss3/subscriptions/1/sensors",
            None,
        );
        assert!(matches!(err, Error::EndpointUnavailable { .. }));
    }

    #[test]
    fn api_response_json_failure_keeps_body() {
        let resp = ApiResponse {
            status: 200,
            body: Bytes::from_static(b"{\"nope\":"),
            attempts: 1,
            total_delay: Duration::ZERO,
        };
        let err = resp.json::<serde_json::Value>().unwrap_err();
        assert!(matches!(err, Error::InvalidResponse { ref body, .. } if body == "{\"nope\":"));
    }
}
