//! Error types for the fetch controller.
//!
//! There are three layers:
//!
//! - [`TransportError`]: the transport call itself did not complete.
//! - [`FetchError`]: the taxonomy of everything that can turn a fetch into an
//!   `Error` state. The controller never hands these to consumers directly; it
//!   converts them into a [`FetchFailure`](crate::state::FetchFailure) with a
//!   client-chosen message.
//! - [`ControllerError`]: misuse of the controller API (empty URL, triggering
//!   after unmount, ...). These are returned to the caller of `trigger`.

use std::fmt::{Display, Formatter};

/// Failure of the transport call (connectivity, DNS, transport timeout).
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error(transparent)]
    Request(#[from] reqwest::Error),

    #[error("request timed out")]
    Timeout,

    #[error("request canceled")]
    Canceled,

    #[error("{0}")]
    Other(String),
}

/// Classification of a failed fetch, exposed to consumers for branching.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FetchErrorKind {
    /// The transport call did not complete
    NetworkFailure,
    /// The transport completed, but the status is outside the success range
    UnacceptableResponse,
    /// The body could not be decoded into the expected shape
    DecodeFailure,
}

impl Display for FetchErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchErrorKind::NetworkFailure => write!(f, "network failure"),
            FetchErrorKind::UnacceptableResponse => write!(f, "unacceptable response"),
            FetchErrorKind::DecodeFailure => write!(f, "decode failure"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("network failure: {0}")]
    NetworkFailure(#[from] TransportError),

    #[error("unacceptable response: {status} {status_text}")]
    UnacceptableResponse { status: u16, status_text: String },

    #[error("decode failure: {0}")]
    DecodeFailure(#[from] serde_json::Error),
}

impl FetchError {
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            FetchError::NetworkFailure(_) => FetchErrorKind::NetworkFailure,
            FetchError::UnacceptableResponse { .. } => FetchErrorKind::UnacceptableResponse,
            FetchError::DecodeFailure(_) => FetchErrorKind::DecodeFailure,
        }
    }

    /// HTTP status code, only known for unacceptable responses
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::UnacceptableResponse { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Errors returned to the caller when the controller cannot honour a request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ControllerError {
    #[error("URL is empty")]
    EmptyUrl,

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Controller has been unmounted")]
    Unmounted,

    #[error("Controller is already mounted")]
    AlreadyMounted,

    #[error("No default URL configured")]
    NoDefaultUrl,

    #[error("Nothing has been fetched yet")]
    NothingToRefetch,
}
