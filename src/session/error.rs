use super::events::Navigation;
use thiserror::Error;

/// Failure of the network primitive itself (no HTTP status was received).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to build request: {0}")]
    Build(String),
    #[error("request timed out")]
    Timeout,
    #[error("unable to reach the server: {0}")]
    Network(String),
}

/// Why a renewal exchange did not produce a usable session.
///
/// `Clone` so the single in-flight result can be handed to every waiter.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RenewalError {
    #[error("no refresh token available")]
    NoRefreshToken,
    #[error("renewal request failed: {0}")]
    Network(String),
    #[error("renewal response is malformed: {0}")]
    Protocol(String),
    #[error("refresh token rejected by the server (status {status})")]
    Rejected { status: u16 },
    /// The session was ended while the exchange was running.
    #[error("session ended while the renewal was in flight")]
    SessionEnded,
    #[error("renewed session could not be stored: {0}")]
    Storage(String),
}

/// What exhausted the single renewal + replay budget of a request.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RetryCause {
    #[error(transparent)]
    Renewal(#[from] RenewalError),
    #[error("replayed request was rejected again")]
    ReplayRejected,
}

/// Error returned by an authenticated request.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The session could not be recovered; it has been cleared and the host
    /// should follow `navigation`.
    #[error("request retry exhausted: {cause}")]
    RetryExhausted {
        navigation: Navigation,
        cause: RetryCause,
    },
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl RequestError {
    /// Navigation intent the host application should act on, if any.
    #[must_use]
    pub fn navigation(&self) -> Option<Navigation> {
        match self {
            Self::RetryExhausted { navigation, .. } => Some(*navigation),
            Self::Transport(_) => None,
        }
    }
}

/// Failure of the credential storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("session storage encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure of the explicit login/register/logout operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("response is malformed: {0}")]
    Protocol(String),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
