//! Lifecycle controller for a single client-side data fetch.
//!
//! A [`FetchController`] tracks one fetch through `Idle → Loading → Success | Error`.
//! Every trigger issues a new [`RequestToken`]; only the outcome of the most
//! recent trigger is ever applied, no matter in which order responses arrive.
//! After unmounting, nothing is applied at all.
//!
//! The controller itself does no I/O. [`worker::spawn`] runs it on a tokio task
//! together with a [`Transport`](net::Transport) and hands back a
//! [`FetchHandle`] for the consumer:
//!
//! ```no_run
//! use gosub_fetch::{config::ControllerConfig, worker};
//! use serde::Deserialize;
//!
//! #[derive(Debug, Clone, Deserialize)]
//! struct User {
//!     id: u32,
//!     name: String,
//! }
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = ControllerConfig::builder()
//!     .default_url("https://api.example.com/users")
//!     .build()?;
//! let (users, _join) = worker::spawn_http::<Vec<User>>(cfg)?;
//!
//! users.on_mount().await?;
//! let state = users.settled().await;
//! match state.data() {
//!     Some(list) => println!("{} users", list.len()),
//!     None => println!("{}", state.error_message().unwrap_or_default()),
//! }
//! # Ok(()) }
//! ```

pub mod config;
pub mod controller;
pub mod errors;
pub mod events;
pub mod handle;
pub mod net;
pub mod state;
pub mod worker;

pub use config::ControllerConfig;
pub use controller::{Completion, ControllerId, FetchController, Ticket};
pub use errors::{ControllerError, FetchError, FetchErrorKind, TransportError};
pub use handle::FetchHandle;
pub use state::{FetchFailure, FetchState, FetchStatus, RequestToken};
