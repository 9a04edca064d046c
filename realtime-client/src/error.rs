//! Client error types

use thiserror::Error;

/// REST (Profile Service) error type
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid response format
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Authentication required
    #[error("Authentication required")]
    Unauthorized,

    /// Permission denied
    #[error("Permission denied: {0}")]
    Forbidden(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Session manager error type
///
/// Only identity resolution and caller misuse surface here; transport
/// failures are absorbed by the connection driver and reported as
/// [`ChannelEvent`](crate::channel::ChannelEvent)s.
#[derive(Debug, Error)]
pub enum SessionError {
    /// `initialize` called without a usable user id
    #[error("No session identity: user id is missing")]
    NoIdentity,

    /// No live connection handle
    #[error("Realtime session not initialized")]
    NotInitialized,

    /// The handle exists but is not in the `connected` state
    #[error("Realtime channel is not connected")]
    NotConnected,

    /// The authentication store has no token
    #[error("No stored auth token, login required")]
    MissingToken,

    /// Called outside of a Tokio runtime
    #[error("No Tokio runtime available to drive the realtime connection")]
    NoRuntime,

    /// Callers may not emit manager-owned events
    #[error("Event '{0}' is reserved by the session manager")]
    ReservedEvent(String),

    /// Profile lookup failed while resolving the identity
    #[error("Profile lookup failed: {0}")]
    Profile(#[from] ClientError),

    /// The authentication store could not be written
    #[error("Token store error: {0}")]
    TokenStore(#[from] std::io::Error),
}

impl SessionError {
    /// Whether the UI must send the user back through login
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            SessionError::NoIdentity | SessionError::MissingToken | SessionError::Profile(_)
        )
    }
}

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;
