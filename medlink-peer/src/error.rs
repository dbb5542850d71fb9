use thiserror::Error;

use crate::relay::RelayError;

/// Errors surfaced by [`crate::Session`] operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("signaling relay unreachable: {0}")]
    RelayUnreachable(String),

    #[error("signaling relay rejected the request ({status}): {message}")]
    RelayRejected { status: u16, message: String },

    #[error("negotiation failed: {0}")]
    Negotiation(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("data channel is not open")]
    ChannelNotReady,

    #[error("session is closed")]
    SessionClosed,

    #[error("session is already active")]
    AlreadyActive,

    #[error("timed out waiting for the data channel")]
    Timeout,

    #[error("payload serialization failed: {0}")]
    Serialization(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl SessionError {
    pub(crate) fn negotiation(err: impl std::fmt::Display) -> Self {
        Self::Negotiation(err.to_string())
    }

    pub(crate) fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    /// Relay failures are retried by the session driver; everything else ends setup.
    pub fn is_relay_failure(&self) -> bool {
        matches!(
            self,
            Self::RelayUnreachable(_) | Self::RelayRejected { .. }
        )
    }
}

impl From<RelayError> for SessionError {
    fn from(err: RelayError) -> Self {
        match err {
            RelayError::Unreachable(message) => Self::RelayUnreachable(message),
            RelayError::Rejected { status, message } => Self::RelayRejected { status, message },
            RelayError::InvalidUrl(message) => Self::Config(message),
        }
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
