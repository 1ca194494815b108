// Resource client construction and shared request helpers.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::auth::TokenManager;
use crate::backoff::RetryPolicy;
use crate::endpoints::{DEFAULT_CLIENT_ID, Endpoints};
use crate::error::Error;
use crate::executor::{ApiRequest, ApiResponse, RequestExecutor};
use crate::rest::models::CommandAck;
use crate::transport::TransportConfig;

/// Everything needed to build a [`SimpliSafeClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoints: Endpoints,
    pub client_id: String,
    pub transport: TransportConfig,
    pub retry: RetryPolicy,
    /// Refresh the access token this long before it expires.
    pub expiry_margin: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoints: Endpoints::default(),
            client_id: DEFAULT_CLIENT_ID.into(),
            transport: TransportConfig::default(),
            retry: RetryPolicy::default(),
            expiry_margin: Duration::from_secs(60),
        }
    }
}

/// Typed client for the SimpliSafe REST API.
///
/// Cheaply cloneable: the HTTP pool, endpoints and token manager are
/// shared between clones.
#[derive(Clone)]
pub struct SimpliSafeClient {
    executor: RequestExecutor,
}

impl SimpliSafeClient {
    /// Build a client (and its token manager) from `config`.
    pub fn new(config: ClientConfig) -> Result<Self, Error> {
        let http = config.transport.build_client()?;
        Ok(Self::from_reqwest(http, config))
    }

    /// Build a client around an existing `reqwest::Client`.
    pub fn from_reqwest(http: reqwest::Client, config: ClientConfig) -> Self {
        let endpoints = Arc::new(config.endpoints);
        let tokens = TokenManager::new(
            http.clone(),
            Arc::clone(&endpoints),
            config.client_id,
            config.expiry_margin,
        );
        let executor = RequestExecutor::new(http, endpoints, tokens, config.retry);
        Self { executor }
    }

    pub fn tokens(&self) -> &TokenManager {
        self.executor.tokens()
    }

    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    pub fn endpoints(&self) -> &Endpoints {
        self.executor.endpoints()
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Execute and decode a JSON body.
    pub(crate) async fn fetch<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, Error> {
        self.executor.execute(&request).await?.json()
    }

    /// Execute a state-changing request and validate the acknowledgement.
    ///
    /// An empty body counts as success; `success: false` is a rejection.
    pub(crate) async fn command(&self, request: ApiRequest) -> Result<CommandAck, Error> {
        let response = self.executor.execute(&request).await?;
        let ack = if response.is_empty() {
            CommandAck::accepted()
        } else {
            response.json::<CommandAck>()?
        };
        ack.into_result(response.status)
    }

    pub(crate) async fn raw(&self, request: ApiRequest) -> Result<ApiResponse, Error> {
        self.executor.execute(&request).await
    }
}
