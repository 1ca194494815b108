// Vendor host configuration.
//
// Production defaults point at the SimpliSafe cloud; tests and proxies
// swap them wholesale through `Endpoints::with_base`.

use url::Url;

use crate::error::Error;

pub const DEFAULT_CLIENT_ID: &str = "42aBZ5lYrVW12jfOuu3CQROitwxg9sN5";
pub const DEFAULT_REDIRECT_URI: &str =
    "com.simplisafe.mobile://auth.simplisafe.com/ios/com.simplisafe.mobile/callback";

const API_BASE: &str = "https://api.simplisafe.com/v1";
const TOKEN_URL: &str = "https://auth.simplisafe.com/oauth/token";
const MFA_CHALLENGE_URL: &str = "https://auth.simplisafe.com/mfa/challenge";
const MEDIA_BASE: &str = "https://media.simplisafe.com/v1";
const PUSH_URL: &str = "wss://socketlink.prd.aser.simplisafe.com";

/// Base URLs for every vendor surface the client talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// REST API root, e.g. `https://api.simplisafe.com/v1`.
    pub api_base: String,
    /// OAuth token endpoint (code, refresh and password grants).
    pub token_url: String,
    /// Multi-factor out-of-band challenge endpoint.
    pub mfa_challenge_url: String,
    /// Camera media root.
    pub media_base: String,
    /// Push (websocket) event endpoint.
    pub push_url: String,
    /// Redirect URI registered for the authorization-code flow.
    pub redirect_uri: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            api_base: API_BASE.into(),
            token_url: TOKEN_URL.into(),
            mfa_challenge_url: MFA_CHALLENGE_URL.into(),
            media_base: MEDIA_BASE.into(),
            push_url: PUSH_URL.into(),
            redirect_uri: DEFAULT_REDIRECT_URI.into(),
        }
    }
}

impl Endpoints {
    /// Point every surface at one host (mock servers, local proxies).
    ///
    /// Layout: `{base}/v1`, `{base}/oauth/token`, `{base}/mfa/challenge`,
    /// `{base}/media/v1`, and the push endpoint on the same host with a
    /// `ws` scheme.
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        let push = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}/push")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}/push")
        } else {
            format!("{base}/push")
        };

        Self {
            api_base: format!("{base}/v1"),
            token_url: format!("{base}/oauth/token"),
            mfa_challenge_url: format!("{base}/mfa/challenge"),
            media_base: format!("{base}/media/v1"),
            push_url: push,
            redirect_uri: DEFAULT_REDIRECT_URI.into(),
        }
    }

    /// Full URL for a REST path relative to `api_base`.
    pub fn api_url(&self, path: &str) -> Result<Url, Error> {
        join(&self.api_base, path)
    }

    /// Full URL for a media path relative to `media_base`.
    pub fn media_url(&self, path: &str) -> Result<Url, Error> {
        join(&self.media_base, path)
    }
}

fn join(base: &str, path: &str) -> Result<Url, Error> {
    let full = format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    Ok(Url::parse(&full)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_url_joins_without_double_slashes() {
        let endpoints = Endpoints::default();
        let url = endpoints.api_url("/api/authCheck").unwrap();
        assert_eq!(url.as_str(), "https://api.simplisafe.com/v1/api/authCheck");
    }

    #[test]
    fn with_base_derives_push_scheme() {
        let endpoints = Endpoints::with_base("http://127.0.0.1:4000/");
        assert_eq!(endpoints.api_base, "http://127.0.0.1:4000/v1");
        assert_eq!(endpoints.push_url, "ws://127.0.0.1:4000/push");

        let secure = Endpoints::with_base("https://proxy.local");
        assert_eq!(secure.push_url, "wss://proxy.local/push");
    }
}
