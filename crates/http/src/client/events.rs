//! Session lifecycle notifications emitted by the client

use std::fmt;

/// Why the client tore the session down
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidationReason {
    /// A 401 arrived and the session held no refresh token
    MissingRefreshToken,
    /// The refresh endpoint answered with a non-success status
    RefreshRejected { status: u16 },
    /// The refresh call failed in transport or returned an unreadable body
    RefreshFailed(String),
    /// The request was still rejected after one refresh-and-retry
    RetryRejected,
}

impl fmt::Display for InvalidationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingRefreshToken => f.write_str("no refresh token available"),
            Self::RefreshRejected { status } => write!(f, "refresh rejected with status {status}"),
            Self::RefreshFailed(message) => write!(f, "refresh failed: {message}"),
            Self::RetryRejected => f.write_str("request rejected after token refresh"),
        }
    }
}

/// Event broadcast to the presentation layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The session was cleared; the user has to sign in again
    Invalidated { reason: InvalidationReason },
}
