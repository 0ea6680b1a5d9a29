// ABOUTME: Error taxonomy surfaced by the session manager to its callers.
// ABOUTME: Maps adapter-level ClientError values onto stable, serializable kinds.

use bcbot_client::ClientError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable error category, serialized in snake_case for tool callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    AlreadyActive,
    NotConnected,
    ConnectionFailed,
    ConnectionLost,
    Timeout,
    InvalidArgument,
    RemoteRejected,
    InternalError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::AlreadyActive => "already_active",
            ErrorKind::NotConnected => "not_connected",
            ErrorKind::ConnectionFailed => "connection_failed",
            ErrorKind::ConnectionLost => "connection_lost",
            ErrorKind::Timeout => "timeout",
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::RemoteRejected => "remote_rejected",
            ErrorKind::InternalError => "internal_error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BotError {
    #[error("bot session is already active")]
    AlreadyActive,

    #[error("bot is not connected")]
    NotConnected,

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("connection lost: {0}")]
    ConnectionLost(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("rejected by server: {0}")]
    RemoteRejected(String),

    #[error("internal error: {0}")]
    InternalError(String),
}

pub type BotResult<T> = std::result::Result<T, BotError>;

impl BotError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BotError::AlreadyActive => ErrorKind::AlreadyActive,
            BotError::NotConnected => ErrorKind::NotConnected,
            BotError::ConnectionFailed(_) => ErrorKind::ConnectionFailed,
            BotError::ConnectionLost(_) => ErrorKind::ConnectionLost,
            BotError::Timeout(_) => ErrorKind::Timeout,
            BotError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            BotError::RemoteRejected(_) => ErrorKind::RemoteRejected,
            BotError::InternalError(_) => ErrorKind::InternalError,
        }
    }

    /// Message without the kind prefix
    pub fn detail(&self) -> String {
        match self {
            BotError::AlreadyActive | BotError::NotConnected => self.to_string(),
            BotError::ConnectionFailed(msg)
            | BotError::ConnectionLost(msg)
            | BotError::Timeout(msg)
            | BotError::InvalidArgument(msg)
            | BotError::RemoteRejected(msg)
            | BotError::InternalError(msg) => msg.clone(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        BotError::InvalidArgument(message.into())
    }

    /// Map a failure from a command primitive on a live session
    pub fn from_command(err: ClientError) -> Self {
        match err {
            ClientError::Rejected(msg) => BotError::RemoteRejected(msg),
            ClientError::Timeout => BotError::Timeout("server did not respond".to_string()),
            ClientError::ConnectionLost(msg) => BotError::ConnectionLost(msg),
            ClientError::AuthRejected(msg) | ClientError::Network(msg) | ClientError::Other(msg) => {
                BotError::InternalError(msg)
            }
        }
    }

    /// Map a failure from the connect handshake
    pub fn from_connect(err: ClientError) -> Self {
        match err {
            ClientError::Timeout => BotError::Timeout("connect timed out".to_string()),
            other => BotError::ConnectionFailed(other.to_string()),
        }
    }
}
