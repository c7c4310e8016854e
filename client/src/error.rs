//! Error types for the HTTP client.
//!
//! # Design
//! Cancellation and deadline expiry get dedicated variants because callers
//! routinely tell them apart from network failures. Everything the engine
//! reports once the request is on its way lands in `Transport` untouched.

use thiserror::Error;

use crate::context::ContextError;

/// Errors returned by `Client` and `ClientBuilder`.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The underlying engine could not be constructed (e.g. TLS backend init).
    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    /// The URL is not a syntactically valid absolute URL.
    #[error("invalid URL {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// The request could not be assembled, typically an invalid header.
    #[error("invalid request: {0}")]
    InvalidRequest(#[source] reqwest::Error),

    /// The context was canceled before a response arrived.
    #[error("context canceled")]
    Canceled,

    /// The context deadline passed before a response arrived.
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    /// Connection, TLS, protocol or engine timeout error.
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

impl ClientError {
    /// True for context deadlines and engine-side timeouts.
    pub fn is_timeout(&self) -> bool {
        match self {
            ClientError::DeadlineExceeded => true,
            ClientError::Transport(err) => err.is_timeout(),
            _ => false,
        }
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, ClientError::Canceled)
    }
}

impl From<ContextError> for ClientError {
    fn from(err: ContextError) -> Self {
        match err {
            ContextError::Canceled => ClientError::Canceled,
            ContextError::DeadlineExceeded => ClientError::DeadlineExceeded,
        }
    }
}
