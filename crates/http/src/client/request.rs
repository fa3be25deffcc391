//! Replayable description of one outbound request

use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use serde_json::Value as JsonValue;

/// Requests are re-issued at most this many times after a token refresh
pub const MAX_RETRIES: u8 = 1;

/// Everything needed to (re)send a request.
///
/// A `reqwest::RequestBuilder` is consumed on send, so the client keeps this
/// description instead and rebuilds the request for the retry. Only the bearer
/// token and the retry count change between attempts.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    body: Option<JsonValue>,
    pub(crate) bearer: Option<String>,
    retry_count: u8,
    uses_session: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
            bearer: None,
            retry_count: 0,
            uses_session: true,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Attach a JSON body
    ///
    /// # Errors
    ///
    /// Returns an error if `body` cannot be serialized
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, serde_json::Error> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Append a query parameter
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Add an extra header sent on every attempt
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Send without a bearer token and hand a `401` back unchanged.
    ///
    /// For credential exchanges, where a `401` means bad credentials rather
    /// than an expired session.
    #[must_use]
    pub const fn without_session(mut self) -> Self {
        self.uses_session = false;
        self
    }

    pub const fn uses_session(&self) -> bool {
        self.uses_session
    }

    pub const fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub const fn retry_count(&self) -> u8 {
        self.retry_count
    }

    pub(crate) const fn can_retry(&self) -> bool {
        self.retry_count < MAX_RETRIES
    }

    pub(crate) fn mark_retried(&mut self) {
        self.retry_count = self.retry_count.saturating_add(1).min(MAX_RETRIES);
    }

    /// Build the reqwest request for one attempt against `base_url`
    pub(crate) fn build(&self, client: &reqwest::Client, base_url: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", base_url, self.path);
        let mut request = client
            .request(self.method.clone(), url)
            .headers(self.headers.clone());

        if !self.query.is_empty() {
            request = request.query(&self.query);
        }
        if let Some(token) = &self.bearer {
            request = request.bearer_auth(token);
        }
        if let Some(body) = &self.body {
            request = request.json(body);
        }
        request
    }
}
