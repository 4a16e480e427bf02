//! Authenticated request gateway.
//!
//! Every backend call goes through [`ApiClient::send`], which attaches the
//! current access token, and on a `401` refreshes the token through the
//! [`RefreshCoordinator`] and replays the request once with the new token. A
//! second `401` is returned to the caller as-is; there is never a second
//! refresh for the same call.
//!
//! Auth endpoints (login, register, refresh, logout) opt out of the retry with
//! [`ApiRequest::without_retry`]: a failed login is not an expired session.

pub mod auth;
pub mod body;
pub mod error;
pub mod resources;
pub mod types;

pub use body::{FilePart, MultipartBody, RequestBody};
pub use error::Error;
pub use types::{Envelope, ProfileUpdate, Registration, User};

use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};

use self::error::map_request_error;
use crate::{
    config::ClientConfig,
    session::{RefreshCoordinator, RefreshOutcome, SessionState, SessionStore},
    APP_USER_AGENT,
};

/// Maximum number of error body characters surfaced to callers.
const MAX_ERROR_CHARS: usize = 200;
const GENERIC_FAILURE: &str = "API request failed";

/// One logical API call. The body is materialized per attempt.
#[derive(Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    body: RequestBody,
    retry_on_unauthorized: bool,
    bearer: Option<SecretString>,
}

impl ApiRequest {
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: RequestBody::Empty,
            retry_on_unauthorized: true,
            bearer: None,
        }
    }

    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    #[must_use]
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    /// Attaches a JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if the body cannot be encoded.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, Error> {
        let value = serde_json::to_value(body)
            .map_err(|err| Error::Serialization(format!("Failed to encode request: {err}")))?;
        self.body = RequestBody::Json(value);
        Ok(self)
    }

    #[must_use]
    pub fn multipart(mut self, body: MultipartBody) -> Self {
        self.body = RequestBody::Multipart(body);
        self
    }

    /// Disables the refresh-and-retry on `401`.
    #[must_use]
    pub fn without_retry(mut self) -> Self {
        self.retry_on_unauthorized = false;
        self
    }

    /// Sends this bearer token instead of the session's current one.
    #[must_use]
    pub fn with_bearer(mut self, token: SecretString) -> Self {
        self.bearer = Some(token);
        self
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn retries_on_unauthorized(&self) -> bool {
        self.retry_on_unauthorized
    }
}

impl std::fmt::Debug for ApiRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let body = match &self.body {
            RequestBody::Empty => "empty",
            RequestBody::Json(_) => "json",
            RequestBody::Multipart(_) => "multipart",
        };
        f.debug_struct("ApiRequest")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("body", &body)
            .field("retry_on_unauthorized", &self.retry_on_unauthorized)
            .field("bearer", &self.bearer.as_ref().map(|_| "***"))
            .finish()
    }
}

struct Inner {
    http: reqwest::Client,
    config: ClientConfig,
    state: Arc<SessionState>,
    refresher: RefreshCoordinator,
}

/// Shared handle to the gateway; cloning is cheap.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("api_base_url", &self.inner.config.api_base_url)
            .field("state", &self.inner.state)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Builds a gateway over `store` with the configured timeout and user agent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Network`] if the HTTP client cannot be built.
    pub fn new(config: ClientConfig, store: Arc<dyn SessionStore>) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(config.timeout)
            .build()
            .map_err(Error::Network)?;

        Ok(Self::with_http_client(http, config, store))
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(
        http: reqwest::Client,
        config: ClientConfig,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        let state = Arc::new(SessionState::new(store));
        let refresher = RefreshCoordinator::new(http.clone(), &config, Arc::clone(&state));

        Self {
            inner: Arc::new(Inner {
                http,
                config,
                state,
                refresher,
            }),
        }
    }

    #[must_use]
    pub fn state(&self) -> &Arc<SessionState> {
        &self.inner.state
    }

    #[must_use]
    pub fn refresher(&self) -> &RefreshCoordinator {
        &self.inner.refresher
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Performs one logical call with at most one refresh-and-retry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionExpired`] when the access token was rejected and
    /// could not be refreshed, [`Error::Api`] with the server's message for any
    /// other failure status, and [`Error::Network`]/[`Error::Timeout`] when the
    /// server could not be reached.
    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    pub async fn send<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<Envelope<T>, Error> {
        let token = request
            .bearer
            .clone()
            .or_else(|| self.inner.state.access_token());

        let mut response = self.dispatch(&request, token.as_ref()).await?;

        if response.status() == StatusCode::UNAUTHORIZED && request.retry_on_unauthorized {
            let current = self.inner.state.access_token();
            if request.bearer.is_none() && replaced(token.as_ref(), current.as_ref()) {
                debug!("Access token replaced while the call was in flight, retrying");
                response = self.dispatch(&request, current.as_ref()).await?;
            } else if self.inner.state.has_refresh_token() {
                debug!("Access token rejected, refreshing");
                match self.inner.refresher.refresh().await {
                    RefreshOutcome::Renewed(token) => {
                        response = self.dispatch(&request, Some(&token)).await?;
                    }
                    RefreshOutcome::Failed => return Err(Error::SessionExpired),
                }
            }
        }

        read_envelope(response).await
    }

    /// Like [`send`](Self::send), returning only the envelope's `data`.
    ///
    /// # Errors
    ///
    /// Same as [`send`](Self::send), plus [`Error::Parse`] when `data` is absent.
    pub async fn fetch<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, Error> {
        self.send::<T>(request).await?.into_data()
    }

    async fn dispatch(
        &self,
        request: &ApiRequest,
        token: Option<&SecretString>,
    ) -> Result<reqwest::Response, Error> {
        let url = self.inner.config.endpoint(&request.path);
        let mut builder = self.inner.http.request(request.method.clone(), &url);

        if let Some(token) = token {
            builder = builder.bearer_auth(token.expose_secret());
        }

        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Multipart(body) => builder.multipart(body.to_form()?),
        };

        let response = builder.send().await.map_err(map_request_error)?;
        debug!(status = response.status().as_u16(), "Response received");
        Ok(response)
    }
}

/// True when the session now holds a different access token than the one a
/// call was sent with.
fn replaced(sent: Option<&SecretString>, current: Option<&SecretString>) -> bool {
    match (sent, current) {
        (Some(sent), Some(current)) => sent.expose_secret() != current.expose_secret(),
        (None, Some(_)) => true,
        (_, None) => false,
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

/// Decodes the standard envelope, turning failure statuses and
/// `success: false` into [`Error::Api`].
pub(crate) async fn read_envelope<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<Envelope<T>, Error> {
    let status = response.status();
    let text = response.text().await.map_err(map_request_error)?;

    if !status.is_success() {
        return Err(Error::Api {
            status: status.as_u16(),
            message: error_message(&text),
        });
    }

    let envelope: Envelope<T> = if text.trim().is_empty() {
        serde_json::from_str("{}")
    } else {
        serde_json::from_str(&text)
    }
    .map_err(|err| Error::Parse(format!("Failed to decode response: {err}")))?;

    if envelope.success {
        Ok(envelope)
    } else {
        Err(Error::Api {
            status: status.as_u16(),
            message: envelope
                .message
                .filter(|message| !message.trim().is_empty())
                .unwrap_or_else(|| GENERIC_FAILURE.to_string()),
        })
    }
}

/// Picks the server's `message`, then `error`, then the raw body.
fn error_message(body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        if let Some(message) = parsed
            .message
            .or(parsed.error)
            .filter(|message| !message.trim().is_empty())
        {
            return message;
        }
    }
    sanitize_body(body)
}

fn sanitize_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() || trimmed.starts_with('{') {
        GENERIC_FAILURE.to_string()
    } else {
        trimmed.chars().take(MAX_ERROR_CHARS).collect()
    }
}
