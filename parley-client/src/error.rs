//! Error types for the Parley client core.

use thiserror::Error;

/// Identity or token failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The user abandoned or never completed sign-in
    #[error("Sign-in was cancelled")]
    Cancelled,

    /// A token was required but no identity is active
    #[error("Not authenticated")]
    NotSignedIn,

    /// The identity provider refused the credentials
    #[error("Identity provider rejected the request: {status} - {message}")]
    Rejected { status: u16, message: String },

    /// Transport or decoding failure talking to the identity provider
    #[error("Identity provider error: {0}")]
    Provider(String),

    /// The identity provider did not answer in time
    #[error("Identity provider timed out")]
    Timeout,
}

/// Backend transport and HTTP failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    /// HTTP request failed before a response arrived
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,

    /// Server returned a non-2xx response
    #[error("Server error: {status} - {message}")]
    Server { status: u16, message: String },

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    Parse(String),
}

impl NetworkError {
    /// HTTP status of the failed response, when one was received.
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Parse(err.to_string())
        } else {
            Self::Request(err.to_string())
        }
    }
}

/// Errors surfaced by [`crate::store::ConversationStore`] operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Network(#[from] NetworkError),

    /// Another mutating operation is in flight
    #[error("Another request is already in progress")]
    Busy,
}

impl StoreError {
    pub const fn is_busy(&self) -> bool {
        matches!(self, Self::Busy)
    }

    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}
