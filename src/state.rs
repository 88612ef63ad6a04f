//! Fetch state: [`FetchState`], [`FetchStatus`], [`RequestToken`] and [`FetchFailure`].
//!
//! A `FetchState` can only be built through its constructors, so `data` and
//! `error` can never be populated at the same time.

use crate::errors::FetchErrorKind;
use std::fmt::{Display, Formatter};

/// Identifies a single fetch attempt. Tokens are handed out in increasing order
/// by the controller; only the most recently issued one is current.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestToken(u64);

impl RequestToken {
    /// Token of a controller that has never been triggered
    pub const NONE: RequestToken = RequestToken(0);

    pub(crate) fn next(self) -> Self {
        Self(self.0 + 1)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl Default for RequestToken {
    fn default() -> Self {
        Self::NONE
    }
}

impl Display for RequestToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Status of the fetch. Exactly one is active at a time.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FetchStatus {
    /// Nothing has been triggered yet
    #[default]
    Idle,
    /// A fetch is in flight
    Loading,
    /// The last fetch resolved and its body was decoded
    Success,
    /// The last fetch failed
    Error,
}

impl FetchStatus {
    /// True for `Success` and `Error`
    pub fn is_settled(&self) -> bool {
        matches!(self, FetchStatus::Success | FetchStatus::Error)
    }
}

impl Display for FetchStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchStatus::Idle => write!(f, "Idle"),
            FetchStatus::Loading => write!(f, "Loading"),
            FetchStatus::Success => write!(f, "Success"),
            FetchStatus::Error => write!(f, "Error"),
        }
    }
}

/// What the consumer gets to see about a failed fetch.
///
/// `message` is always the client-configured text for the failure kind. Raw
/// transport or server text never ends up here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    kind: FetchErrorKind,
    message: String,
    status: Option<u16>,
}

impl FetchFailure {
    pub fn new(kind: FetchErrorKind, message: impl Into<String>, status: Option<u16>) -> Self {
        Self {
            kind,
            message: message.into(),
            status,
        }
    }

    pub fn kind(&self) -> FetchErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// HTTP status code for unacceptable responses
    pub fn status(&self) -> Option<u16> {
        self.status
    }
}

impl Display for FetchFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Snapshot of a single fetch lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchState<T> {
    status: FetchStatus,
    data: Option<T>,
    error: Option<FetchFailure>,
    token: RequestToken,
}

impl<T> Default for FetchState<T> {
    fn default() -> Self {
        Self::idle()
    }
}

impl<T> FetchState<T> {
    pub fn idle() -> Self {
        Self {
            status: FetchStatus::Idle,
            data: None,
            error: None,
            token: RequestToken::NONE,
        }
    }

    pub(crate) fn loading(token: RequestToken) -> Self {
        Self {
            status: FetchStatus::Loading,
            data: None,
            error: None,
            token,
        }
    }

    pub(crate) fn success(token: RequestToken, data: T) -> Self {
        Self {
            status: FetchStatus::Success,
            data: Some(data),
            error: None,
            token,
        }
    }

    pub(crate) fn failed(token: RequestToken, failure: FetchFailure) -> Self {
        Self {
            status: FetchStatus::Error,
            data: None,
            error: Some(failure),
            token,
        }
    }

    #[inline]
    pub fn status(&self) -> FetchStatus {
        self.status
    }

    #[inline]
    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    #[inline]
    pub fn error(&self) -> Option<&FetchFailure> {
        self.error.as_ref()
    }

    /// Shortcut for the user-presentable error message
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.message())
    }

    /// Token of the fetch this state belongs to
    #[inline]
    pub fn token(&self) -> RequestToken {
        self.token
    }

    pub fn is_loading(&self) -> bool {
        self.status == FetchStatus::Loading
    }

    pub fn into_data(self) -> Option<T> {
        self.data
    }
}
