// ABOUTME: Error type returned by chat client primitives.
// ABOUTME: Distinguishes service denials, timeouts and lost connections from other failures.

use thiserror::Error;

/// Failure reported by a chat client or session primitive
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    /// Login was refused by the service (bad credentials, banned account)
    #[error("authentication rejected: {0}")]
    AuthRejected(String),

    #[error("network error: {0}")]
    Network(String),

    /// The service understood the request and refused it (room full, not a member, ...)
    #[error("rejected by service: {0}")]
    Rejected(String),

    #[error("operation timed out")]
    Timeout,

    /// The underlying connection is gone; the session cannot be used anymore
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    #[error("{0}")]
    Other(String),
}

pub type ClientResult<T> = Result<T, ClientError>;

impl From<anyhow::Error> for ClientError {
    fn from(e: anyhow::Error) -> Self {
        ClientError::Other(e.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        ClientError::Other(format!("malformed payload: {}", e))
    }
}
