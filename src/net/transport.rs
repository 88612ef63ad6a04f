use crate::errors::TransportError;
use crate::net::Response;
use async_trait::async_trait;
use http::header::{HeaderName, HeaderValue};
use http::HeaderMap;
use std::time::Duration;
use url::Url;

/// Per-request options passed through to the transport.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    /// Extra request headers
    pub headers: HeaderMap,
    /// Transport-level timeout. When `None`, the controller default applies.
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a request header. Invalid names or values are ignored.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => log::warn!("Ignoring invalid request header '{}'", name),
        }
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Anything that can perform a GET request and hand back a buffered [`Response`].
///
/// The controller never looks at how the request is performed. Non-2xx
/// statuses are *not* errors at this level; they come back as a `Response` and
/// the controller decides whether they are acceptable.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, url: &Url, options: &RequestOptions) -> Result<Response, TransportError>;
}
