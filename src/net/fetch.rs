use crate::errors::TransportError;
use crate::net::{RequestOptions, Response, Transport};
use async_trait::async_trait;
use std::time::Duration;
use url::Url;

/// [`Transport`] backed by a shared `reqwest` client. Only issues GET requests.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    default_timeout: Option<Duration>,
}

impl HttpTransport {
    /// Creates a transport sending the given user agent on every request.
    pub fn new(user_agent: &str, default_timeout: Option<Duration>) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder().user_agent(user_agent).build()?;
        Ok(Self::with_client(client, default_timeout))
    }

    /// Wraps an existing client (connection pool, proxies, ... are kept).
    pub fn with_client(client: reqwest::Client, default_timeout: Option<Duration>) -> Self {
        Self {
            client,
            default_timeout,
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    // Loads an URL and returns the fully buffered response
    async fn request(&self, url: &Url, options: &RequestOptions) -> Result<Response, TransportError> {
        let mut req = self.client.get(url.clone()).headers(options.headers.clone());
        if let Some(timeout) = options.timeout.or(self.default_timeout) {
            req = req.timeout(timeout);
        }

        let res = req.send().await.map_err(map_reqwest_error)?;

        // Fetch results
        let final_url = res.url().clone();
        let status = res.status().as_u16();
        let status_text = res.status().canonical_reason().unwrap_or("Unknown").to_string();
        let headers = res.headers().clone();

        // Fetch body. We don't do streaming yet
        let body = res.bytes().await.map_err(map_reqwest_error)?.to_vec();

        log::debug!("GET {} -> {} ({} bytes)", final_url, status, body.len());

        Ok(Response {
            url: final_url,
            status,
            status_text,
            headers,
            body,
        })
    }
}

fn map_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Request(e)
    }
}

