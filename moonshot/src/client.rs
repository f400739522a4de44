// Copyright 2026 The moonshot-rs Project
// SPDX-License-Identifier: Apache-2.0

// API client
//
// Responsibilities:
// - Build a validated, read-only configuration from builder input
// - Attach authentication and identification headers to every request
// - Send through the configured transport and log with a request id
// - Route non-2xx responses to the error classifier

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::chat::ChatService;
use crate::config::{ClientConfig, ConfigError, PartialConfig};
use crate::error::{classify_response, read_failure, ApiError, Error, Result};
use crate::files::FilesService;
use crate::transport::{HttpError, HttpRequest, HttpResponse, HttpSender, ReqwestHttpSender};

/// Client for the Moonshot API. Cheap to clone; clones share configuration
/// and transport.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: ClientConfig,
    http: Arc<dyn HttpSender>,
    /// Authorization and User-Agent, validated at build time.
    headers: HeaderMap,
}

impl Client {
    /// Client with default settings and the given API key.
    pub fn new(api_key: impl Into<String>) -> Result<Self, ConfigError> {
        Self::builder().api_key(api_key).build()
    }

    /// Client with default settings and the key from `MOONSHOT_API_KEY`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::builder().build()
    }

    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Chat completions and token counting.
    pub fn chat(&self) -> ChatService {
        ChatService::new(self.clone())
    }

    /// File upload and management.
    pub fn files(&self) -> FilesService {
        FilesService::new(self.clone())
    }

    // -----------------------------------------------------------------------
    // Request plumbing (crate-internal)
    // -----------------------------------------------------------------------

    /// Request to `path` with auth headers and the configured timeout.
    pub(crate) fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<HttpRequest> {
        let mut url = self.inner.config.endpoint(path);
        if !query.is_empty() {
            url = reqwest::Url::parse_with_params(&url, query)
                .map_err(|e| ConfigError::Validation(format!("invalid request url \"{url}\": {e}")))?
                .into();
        }
        Ok(self.prepare(method, url))
    }

    /// Request to the base URL extended by `segments`, each percent-encoded
    /// as a single path segment.
    pub(crate) fn request_to(&self, method: Method, segments: &[&str]) -> Result<HttpRequest> {
        let base = &self.inner.config.base_url;
        let invalid = |detail: String| ConfigError::Validation(format!("invalid request url \"{base}\": {detail}"));
        let mut url = reqwest::Url::parse(base).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| invalid("base url cannot have a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(self.prepare(method, url.into()))
    }

    fn prepare(&self, method: Method, url: String) -> HttpRequest {
        let mut req = HttpRequest::new(method, url);
        req.headers = self.inner.headers.clone();
        req.timeout = Some(self.inner.config.timeout);
        req
    }

    /// Request with a JSON body.
    pub(crate) fn json_request<T: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: &T,
    ) -> Result<HttpRequest> {
        let mut req = self.request(method, path, &[])?;
        req.body = Bytes::from(serde_json::to_vec(body).map_err(Error::Encode)?);
        req.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(req)
    }

    /// Send a request, returning the response only if its status is 2xx.
    pub(crate) async fn send(
        &self,
        mut request: HttpRequest,
        cancel: Option<&CancellationToken>,
        request_id: &str,
    ) -> Result<HttpResponse> {
        request.cancel = cancel.cloned();
        let timeout = request.timeout;
        let method = request.method.clone();
        let url = request.url.clone();
        let started = Instant::now();

        tracing::debug!(request_id, %method, %url, stream = request.stream, "sending request");

        let response = match self.inner.http.send(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(request_id, %method, %url, error = %e, "request failed");
                return Err(Error::Transport(e));
            }
        };

        let status = response.status.as_u16();
        let elapsed_ms = started.elapsed().as_millis() as u64;

        if response.status.is_success() {
            tracing::debug!(request_id, status, elapsed_ms, "response received");
            return Ok(response);
        }

        let api_error = match cancel {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => {
                    tracing::warn!(request_id, status, "cancelled while reading error body");
                    return Err(Error::Transport(HttpError::Cancelled));
                }
                api_error = read_error_body(response, timeout) => api_error,
            },
            None => read_error_body(response, timeout).await,
        };
        tracing::warn!(
            request_id,
            status,
            elapsed_ms,
            code = %api_error.code,
            "api returned error"
        );
        Err(Error::Api(api_error))
    }

    /// Send a request and decode its 2xx body as JSON.
    pub(crate) async fn send_json<T: DeserializeOwned>(
        &self,
        request: HttpRequest,
        cancel: Option<&CancellationToken>,
        what: &'static str,
    ) -> Result<T> {
        let request_id = new_request_id();
        let response = self.send(request, cancel, &request_id).await?;
        let body = response.body.collect().await?;
        serde_json::from_slice(&body).map_err(|source| {
            tracing::warn!(request_id = %request_id, what, error = %source, "malformed response body");
            Error::Decode { what, source }
        })
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

/// Classify a non-2xx response, giving up on a body that stalls past
/// `timeout`.
async fn read_error_body(response: HttpResponse, timeout: Option<Duration>) -> ApiError {
    let status = response.status.as_u16();
    match timeout {
        Some(limit) => tokio::time::timeout(limit, classify_response(response))
            .await
            .unwrap_or_else(|_| read_failure(status, format!("no complete body within {limit:?}"))),
        None => classify_response(response).await,
    }
}

pub(crate) fn new_request_id() -> String {
    Uuid::new_v4().to_string()
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Named, optional client settings.
///
/// Unset fields fall back to file settings passed to [`ClientBuilder::config`],
/// then to the environment (API key only), then to defaults.
#[derive(Default)]
pub struct ClientBuilder {
    settings: PartialConfig,
    http: Option<Arc<dyn HttpSender>>,
}

impl ClientBuilder {
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.settings.api_key = Some(api_key.into());
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.settings.base_url = Some(base_url.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.settings.timeout = Some(timeout);
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.settings.user_agent = Some(user_agent.into());
        self
    }

    /// Settings loaded from a config file. Values set directly on the
    /// builder take precedence.
    pub fn config(mut self, file: PartialConfig) -> Self {
        self.settings = file.merge(self.settings);
        self
    }

    /// Custom transport, e.g. a test double.
    pub fn transport(mut self, http: Arc<dyn HttpSender>) -> Self {
        self.http = Some(http);
        self
    }

    /// Use a preconfigured reqwest client (proxies, TLS roots).
    pub fn http_client(self, client: reqwest::Client) -> Self {
        self.transport(Arc::new(ReqwestHttpSender::new(client)))
    }

    pub fn build(self) -> Result<Client, ConfigError> {
        let config = self.settings.resolve()?;
        Self::finish(config, self.http)
    }

    /// Like [`build`](Self::build) with `env_api_key` standing in for
    /// `MOONSHOT_API_KEY`.
    pub fn build_with_env(self, env_api_key: Option<String>) -> Result<Client, ConfigError> {
        let config = self.settings.resolve_with_env(env_api_key)?;
        Self::finish(config, self.http)
    }

    fn finish(config: ClientConfig, http: Option<Arc<dyn HttpSender>>) -> Result<Client, ConfigError> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.api_key)).map_err(|_| {
            ConfigError::Validation("api key contains characters not allowed in a header".to_string())
        })?;
        auth.set_sensitive(true);
        let user_agent = HeaderValue::from_str(&config.user_agent).map_err(|_| {
            ConfigError::Validation(format!(
                "user_agent \"{}\" contains characters not allowed in a header",
                config.user_agent
            ))
        })?;

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(USER_AGENT, user_agent);

        let http = http.unwrap_or_else(|| Arc::new(ReqwestHttpSender::default()));

        tracing::debug!(base_url = %config.base_url, timeout_ms = config.timeout.as_millis() as u64, "client configured");

        Ok(Client {
            inner: Arc::new(ClientInner {
                config,
                http,
                headers,
            }),
        })
    }
}
