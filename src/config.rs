//! Controller configuration.
//!
//! `ControllerConfig` controls how a [`FetchController`](crate::controller::FetchController)
//! and its worker behave: the URL fetched on mount, the messages shown for each
//! kind of failure, the transport defaults and channel sizes.
//!
//! `ControllerConfig` provides defaults via [`Default`] and a fluent
//! [`ControllerConfig::builder()`] for customization with validation.
//!
//! # Examples
//!
//! ## Use defaults
//! ```rust
//! use gosub_fetch::config::ControllerConfig;
//! let cfg = ControllerConfig::default();
//! assert_eq!(cfg.messages.unacceptable_response, "Sorry something went wrong");
//! ```
//!
//! ## Customize with the builder
//! ```rust
//! use gosub_fetch::config::ControllerConfig;
//! use std::time::Duration;
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = ControllerConfig::builder()
//!     .default_url("https://api.example.com/users")
//!     .request_timeout(Duration::from_secs(5))
//!     .unacceptable_response_message("Could not load users")
//!     .build()?; // returns Result<ControllerConfig, ConfigError>
//! # Ok(()) }
//! ```
//!
//! # Errors
//!
//! Builder validation returns [`ConfigError`] for a default URL that does not
//! parse or is not http(s), an empty failure message, a zero timeout or a zero
//! channel capacity.

use crate::controller::parse_url;
use crate::errors::FetchErrorKind;
use std::fmt;
use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = "Gosub/1.0 (X11; Linux x86_64) GosubFetch/1.0";

/// Default capacity for command and event channels
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Client-authored messages placed in the `Error` state, one per failure kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorMessages {
    pub network_failure: String,
    pub unacceptable_response: String,
    pub decode_failure: String,
}

impl Default for ErrorMessages {
    fn default() -> Self {
        Self {
            network_failure: "Request failed".to_string(),
            unacceptable_response: "Sorry something went wrong".to_string(),
            decode_failure: "The response could not be read".to_string(),
        }
    }
}

impl ErrorMessages {
    pub fn for_kind(&self, kind: FetchErrorKind) -> &str {
        match kind {
            FetchErrorKind::NetworkFailure => &self.network_failure,
            FetchErrorKind::UnacceptableResponse => &self.unacceptable_response,
            FetchErrorKind::DecodeFailure => &self.decode_failure,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// URL fetched by `on_mount`
    pub default_url: Option<String>,
    /// User agent sent by the HTTP transport
    pub user_agent: String,
    /// Transport-level timeout applied when the request options don't set one
    pub request_timeout: Option<Duration>,
    /// Physically abort superseded requests instead of only ignoring their result
    pub abort_superseded: bool,
    /// Capacity of the command, completion and event channels
    pub channel_capacity: usize,
    /// Messages shown to the consumer for each failure kind
    pub messages: ErrorMessages,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            default_url: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout: None,
            abort_superseded: true,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            messages: ErrorMessages::default(),
        }
    }
}

impl ControllerConfig {
    pub fn builder() -> ControllerConfigBuilder {
        ControllerConfigBuilder::default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ControllerConfigBuilder {
    inner: ControllerConfig,
}

#[rustfmt::skip]
impl ControllerConfigBuilder {
    #[inline]
    fn map(mut self, f: impl FnOnce(&mut ControllerConfig)) -> Self {
        f(&mut self.inner);
        self
    }

    pub fn default_url<S: Into<String>>(self, url: S) -> Self { self.map(|c| c.default_url = Some(url.into())) }
    pub fn user_agent<S: Into<String>>(self, ua: S) -> Self { self.map(|c| c.user_agent = ua.into()) }
    pub fn request_timeout(self, timeout: Duration) -> Self { self.map(|c| c.request_timeout = Some(timeout)) }
    pub fn abort_superseded(self, on: bool) -> Self { self.map(|c| c.abort_superseded = on) }
    pub fn channel_capacity(self, n: usize) -> Self { self.map(|c| c.channel_capacity = n) }
    pub fn network_failure_message<S: Into<String>>(self, msg: S) -> Self { self.map(|c| c.messages.network_failure = msg.into()) }
    pub fn unacceptable_response_message<S: Into<String>>(self, msg: S) -> Self { self.map(|c| c.messages.unacceptable_response = msg.into()) }
    pub fn decode_failure_message<S: Into<String>>(self, msg: S) -> Self { self.map(|c| c.messages.decode_failure = msg.into()) }

    /// Apply multiple changes in one go.
    pub fn with(self, f: impl FnOnce(&mut ControllerConfig)) -> Self { self.map(f) }

    /// Validate and build the final config.
    pub fn build(self) -> Result<ControllerConfig, ConfigError> {
        validate(&self.inner)?;
        Ok(self.inner)
    }
}

// ---------- Validation ----------

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    InvalidDefaultUrl { url: String, reason: String },
    EmptyMessage(FetchErrorKind),
    ZeroTimeout,
    ZeroChannelCapacity,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidDefaultUrl { url, reason } =>
                write!(f, "default_url '{url}' is not a valid URL: {reason}"),
            ConfigError::EmptyMessage(kind) =>
                write!(f, "message for {kind} must not be empty"),
            ConfigError::ZeroTimeout =>
                write!(f, "request_timeout must be larger than zero"),
            ConfigError::ZeroChannelCapacity =>
                write!(f, "channel_capacity must be at least 1"),
        }
    }
}
impl std::error::Error for ConfigError {}

fn validate(c: &ControllerConfig) -> Result<(), ConfigError> {
    if let Some(url) = &c.default_url {
        // Same check as a trigger, so a config that builds can always mount
        if let Err(e) = parse_url(url) {
            return Err(ConfigError::InvalidDefaultUrl {
                url: url.clone(),
                reason: e.to_string(),
            });
        }
    }
    for kind in [
        FetchErrorKind::NetworkFailure,
        FetchErrorKind::UnacceptableResponse,
        FetchErrorKind::DecodeFailure,
    ] {
        if c.messages.for_kind(kind).trim().is_empty() {
            return Err(ConfigError::EmptyMessage(kind));
        }
    }
    if c.request_timeout == Some(Duration::ZERO) {
        return Err(ConfigError::ZeroTimeout);
    }
    if c.channel_capacity == 0 {
        return Err(ConfigError::ZeroChannelCapacity);
    }
    Ok(())
}
