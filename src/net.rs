//! Network layer: the [`Transport`] capability the controller fetches through,
//! the buffered [`Response`] it returns, and the reqwest-backed [`HttpTransport`].

mod fetch;
mod response;
mod transport;

pub use fetch::HttpTransport;
pub use response::Response;
pub use transport::{RequestOptions, Transport};
