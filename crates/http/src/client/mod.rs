//! Hepatica API client
//!
//! Every request goes through [`ApiClient::send`]:
//!
//! 1. the access token from the [`SessionStore`] is attached as a bearer token
//! 2. the request is sent
//! 3. a `401` on a request that has not been retried triggers one call to the
//!    refresh endpoint; on success the store's access token is replaced and
//!    the request is re-sent with it
//! 4. if no refresh is possible, the refresh fails or the retried request is
//!    rejected again, the session is cleared, a [`SessionEvent::Invalidated`]
//!    is broadcast and the original `401` is returned to the caller

pub mod admin;
pub mod auth;
pub mod consent;
pub mod error;
pub mod events;
pub mod features;
pub mod general;
pub mod predictions;
pub mod request;

use bytes::Bytes;
use error::ClientError;
use events::{InvalidationReason, SessionEvent};
use hepatica_core::{AuthTokens, RefreshRequest, RefreshResponse, SessionStore};
use request::ApiRequest;
use reqwest::{Client, ClientBuilder, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info, warn};

/// Path of the token refresh endpoint
pub const REFRESH_PATH: &str = "/api/auth/refresh/";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_USER_AGENT: &str = concat!("hepatica-client/", env!("CARGO_PKG_VERSION"));
const EVENT_CAPACITY: usize = 16;

/// Client for the prediction API.
///
/// Cheap to clone; clones share the session, the refresh guard and the event
/// channel.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: Client,
    base_url: String,
    session: Arc<SessionStore>,
    events: broadcast::Sender<SessionEvent>,
    refresh_guard: Option<Mutex<()>>,
}

impl ApiClient {
    /// Create a new client with default configuration and an in-memory session
    ///
    /// # Errors
    ///
    /// Returns an error if `base_url` is not a valid URL
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::builder().base_url(base_url).build()
    }

    /// Create a new client builder
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Session store this client reads tokens from and clears on failure
    pub fn session(&self) -> &Arc<SessionStore> {
        &self.inner.session
    }

    /// Subscribe to session lifecycle events
    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Send a request through the bearer/refresh protocol.
    ///
    /// Any status other than an unrecoverable `401` is returned as-is. Requests
    /// marked [`ApiRequest::without_session`] skip the bearer token and the
    /// refresh handling entirely.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Request`] on transport failure and
    /// [`ClientError::AuthenticationFailed`] once the session was torn down
    #[tracing::instrument(skip_all, fields(method = %request.method(), path = request.path()))]
    pub async fn send(&self, mut request: ApiRequest) -> Result<Response, ClientError> {
        if !request.uses_session() {
            debug!("Sending request without session");
            request.bearer = None;
            return Ok(request
                .build(&self.inner.http, &self.inner.base_url)
                .send()
                .await?);
        }

        if request.retry_count() == 0 {
            request.bearer = self.inner.session.tokens().map(|tokens| tokens.access);
        }

        loop {
            debug!(
                authenticated = request.bearer.is_some(),
                attempt = request.retry_count() + 1,
                "Sending request"
            );
            let response = request
                .build(&self.inner.http, &self.inner.base_url)
                .send()
                .await?;

            if response.status() != StatusCode::UNAUTHORIZED {
                return Ok(response);
            }

            let message = response
                .text()
                .await
                .unwrap_or_else(|_| StatusCode::UNAUTHORIZED.to_string());

            if !request.can_retry() {
                self.invalidate(InvalidationReason::RetryRejected);
                return Err(ClientError::AuthenticationFailed(message));
            }
            request.mark_retried();

            match self.renew_access_token(request.bearer.as_deref()).await {
                Ok(access) => request.bearer = Some(access),
                Err(reason) => {
                    self.invalidate(reason);
                    return Err(ClientError::AuthenticationFailed(message));
                }
            }
        }
    }

    /// Send a request and decode a JSON success body
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a non-success status or an
    /// undecodable body
    pub async fn execute<T: serde::de::DeserializeOwned>(
        &self,
        request: ApiRequest,
    ) -> Result<T, ClientError> {
        let response = Self::check_status(self.send(request).await?).await?;
        Ok(response.json().await?)
    }

    /// Send a request and return the raw success body
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-success status
    pub async fn execute_bytes(&self, request: ApiRequest) -> Result<Bytes, ClientError> {
        let response = Self::check_status(self.send(request).await?).await?;
        Ok(response.bytes().await?)
    }

    async fn check_status(response: Response) -> Result<Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let message = response.text().await.unwrap_or_else(|_| status.to_string());
            Err(ClientError::from_status(status, message))
        }
    }

    /// Obtain a fresh access token after `failed_access` was rejected
    async fn renew_access_token(
        &self,
        failed_access: Option<&str>,
    ) -> Result<String, InvalidationReason> {
        let _guard = match &self.inner.refresh_guard {
            Some(guard) => Some(guard.lock().await),
            None => None,
        };

        let tokens = self
            .inner
            .session
            .tokens()
            .ok_or(InvalidationReason::MissingRefreshToken)?;

        // Another request refreshed while this one waited for the guard
        if self.inner.refresh_guard.is_some()
            && failed_access.is_some_and(|failed| failed != tokens.access)
        {
            debug!("Reusing access token refreshed by a concurrent request");
            return Ok(tokens.access);
        }

        let access = self.request_refresh(&tokens.refresh).await?;
        self.inner.session.update_tokens(AuthTokens {
            access: access.clone(),
            refresh: tokens.refresh,
        });
        info!("Access token refreshed");
        Ok(access)
    }

    /// Call the refresh endpoint directly, outside the 401 handling
    async fn request_refresh(&self, refresh: &str) -> Result<String, InvalidationReason> {
        let url = format!("{}{}", self.inner.base_url, REFRESH_PATH);
        let body = RefreshRequest {
            refresh: refresh.to_string(),
        };

        let response = self
            .inner
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| InvalidationReason::RefreshFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(InvalidationReason::RefreshRejected {
                status: status.as_u16(),
            });
        }

        let body: RefreshResponse = response
            .json()
            .await
            .map_err(|e| InvalidationReason::RefreshFailed(e.to_string()))?;
        Ok(body.access)
    }

    /// Clear the session and tell the presentation layer about it
    fn invalidate(&self, reason: InvalidationReason) {
        warn!(%reason, "Session invalidated");
        self.inner.session.logout();
        // No subscribers is fine; the session is cleared either way
        let _ = self.inner.events.send(SessionEvent::Invalidated { reason });
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url)
            .field("single_flight_refresh", &self.inner.refresh_guard.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for [`ApiClient`]
pub struct ApiClientBuilder {
    base_url: Option<String>,
    timeout: Duration,
    user_agent: Option<String>,
    session: Option<Arc<SessionStore>>,
    single_flight_refresh: bool,
}

impl Default for ApiClientBuilder {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: DEFAULT_TIMEOUT,
            user_agent: None,
            session: None,
            single_flight_refresh: true,
        }
    }
}

impl ApiClientBuilder {
    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the request timeout
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Share an existing session store
    pub fn session(mut self, session: Arc<SessionStore>) -> Self {
        self.session = Some(session);
        self
    }

    /// Let concurrent `401`s share one refresh call (on by default)
    pub const fn single_flight_refresh(mut self, enabled: bool) -> Self {
        self.single_flight_refresh = enabled;
        self
    }

    /// Build the client
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is missing or invalid, or the HTTP
    /// client cannot be constructed
    pub fn build(self) -> Result<ApiClient, ClientError> {
        let base_url = self
            .base_url
            .ok_or_else(|| ClientError::Configuration("base_url is required".into()))?;

        // Ensure base_url ends without a trailing slash
        let base_url = base_url.trim_end_matches('/').to_string();
        url::Url::parse(&base_url)
            .map_err(|e| ClientError::Configuration(format!("invalid base_url {base_url}: {e}")))?;

        let user_agent = self
            .user_agent
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        let http = ClientBuilder::new()
            .timeout(self.timeout)
            .user_agent(user_agent)
            .build()?;

        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Ok(ApiClient {
            inner: Arc::new(ClientInner {
                http,
                base_url,
                session: self
                    .session
                    .unwrap_or_else(|| Arc::new(SessionStore::in_memory())),
                events,
                refresh_guard: self.single_flight_refresh.then(|| Mutex::new(())),
            }),
        })
    }
}
