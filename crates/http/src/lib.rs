//! Hepatica HTTP client
//!
//! Wraps the prediction API behind [`client::ApiClient`], which attaches the
//! session's bearer token to every request and recovers from an expired
//! access token with a single refresh-and-retry.

pub mod client;

pub use client::error::ClientError;
pub use client::events::{InvalidationReason, SessionEvent};
pub use client::request::ApiRequest;
pub use client::{ApiClient, ApiClientBuilder};
