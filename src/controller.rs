//! The fetch lifecycle controller: [`FetchController`], [`ControllerId`], [`Ticket`] and [`Completion`].
//!
//! A `FetchController` owns exactly one [`FetchState`] and is the only thing that
//! mutates it. It does no I/O itself: [`trigger`](FetchController::trigger) hands
//! out a [`Ticket`] describing what to fetch, and whoever performs the request
//! feeds the outcome back through [`complete`](FetchController::complete).
//!
//! Every trigger issues a new [`RequestToken`]. Only the outcome carrying the
//! most recently issued token is applied; everything else is dropped. After
//! [`on_unmount`](FetchController::on_unmount) nothing is applied at all.

use crate::config::ControllerConfig;
use crate::errors::{ControllerError, FetchError, TransportError};
use crate::net::{RequestOptions, Response};
use crate::state::{FetchFailure, FetchState, FetchStatus, RequestToken};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use url::Url;
use uuid::Uuid;

/// A unique identifier for a controller, used to tell controllers apart in logs
/// and events. Treat it as an opaque handle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ControllerId(Uuid);

impl ControllerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ControllerId {
    fn default() -> Self {
        Self::new()
    }
}

/// A fetch that has been started by the controller and must be performed by a transport.
#[derive(Debug, Clone, PartialEq)]
pub struct Ticket {
    pub token: RequestToken,
    pub url: Url,
    pub options: RequestOptions,
}

/// What happened to an outcome passed to [`FetchController::complete`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Completion {
    /// The outcome belonged to the current fetch and moved the state to this status
    Applied(FetchStatus),
    /// The outcome belonged to a superseded fetch and was dropped
    Stale,
    /// The controller is unmounted; the outcome was dropped
    Inactive,
}

pub struct FetchController<T> {
    /// ID of the controller
    id: ControllerId,
    config: Arc<ControllerConfig>,
    /// Current state
    state: FetchState<T>,
    /// Last issued token. This is the only token whose outcome is applied.
    current: RequestToken,
    /// URL and options of the last trigger, for refetching
    last_request: Option<(Url, RequestOptions)>,
    /// Has on_mount been called?
    mounted: bool,
    /// False once unmounted
    active: bool,
}

impl<T> FetchController<T>
where
    T: DeserializeOwned + Clone,
{
    pub fn new(config: ControllerConfig) -> Self {
        Self::with_config(Arc::new(config))
    }

    pub fn with_config(config: Arc<ControllerConfig>) -> Self {
        Self {
            id: ControllerId::new(),
            config,
            state: FetchState::idle(),
            current: RequestToken::NONE,
            last_request: None,
            mounted: false,
            active: true,
        }
    }

    pub fn id(&self) -> ControllerId {
        self.id
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Starts a new fetch of `url`, superseding any fetch still in flight.
    ///
    /// The state moves to `Loading` and any previous data or error is cleared.
    pub fn trigger(&mut self, url: &str, options: RequestOptions) -> Result<Ticket, ControllerError> {
        if !self.active {
            return Err(ControllerError::Unmounted);
        }

        let url = parse_url(url)?;
        self.start(url, options)
    }

    /// Triggers the URL and options of the most recent fetch again.
    pub fn refetch(&mut self) -> Result<Ticket, ControllerError> {
        if !self.active {
            return Err(ControllerError::Unmounted);
        }

        let (url, options) = self
            .last_request
            .clone()
            .ok_or(ControllerError::NothingToRefetch)?;
        self.start(url, options)
    }

    /// Triggers the configured default URL. Only succeeds once per controller.
    pub fn on_mount(&mut self) -> Result<Ticket, ControllerError> {
        if !self.active {
            return Err(ControllerError::Unmounted);
        }
        if self.mounted {
            return Err(ControllerError::AlreadyMounted);
        }

        let url = self
            .config
            .default_url
            .clone()
            .ok_or(ControllerError::NoDefaultUrl)?;
        let ticket = self.trigger(&url, RequestOptions::default())?;
        self.mounted = true;

        Ok(ticket)
    }

    /// Marks the controller inactive. No outcome is applied after this point.
    pub fn on_unmount(&mut self) {
        if self.active {
            log::debug!("Controller[{:?}]: unmounted at {}", self.id, self.current);
        }
        self.active = false;
    }

    /// Applies the outcome of the fetch identified by `token`.
    pub fn complete(
        &mut self,
        token: RequestToken,
        outcome: Result<Response, TransportError>,
    ) -> Completion {
        if !self.active {
            log::debug!("Controller[{:?}]: dropping {} after unmount", self.id, token);
            return Completion::Inactive;
        }
        if !self.is_current(token) {
            log::debug!(
                "Controller[{:?}]: dropping stale {} (current is {})",
                self.id,
                token,
                self.current
            );
            return Completion::Stale;
        }

        self.state = match resolve::<T>(outcome) {
            Ok(data) => FetchState::success(token, data),
            Err(e) => {
                // The raw error only goes to the log, never into the state
                log::debug!("Controller[{:?}]: fetch {} failed: {}", self.id, token, e);
                let kind = e.kind();
                let failure = FetchFailure::new(kind, self.config.messages.for_kind(kind), e.status());
                FetchState::failed(token, failure)
            }
        };

        Completion::Applied(self.state.status())
    }

    /// Returns true when `token` is the in-flight fetch whose outcome will be applied.
    pub fn is_current(&self, token: RequestToken) -> bool {
        self.active && token == self.current && self.state.is_loading()
    }

    /// Snapshot of the current state
    pub fn current_state(&self) -> FetchState<T> {
        self.state.clone()
    }

    #[inline]
    pub fn state(&self) -> &FetchState<T> {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Token of the fetch in flight, if any
    pub fn in_flight(&self) -> Option<RequestToken> {
        self.state.is_loading().then_some(self.current)
    }

    fn start(&mut self, url: Url, mut options: RequestOptions) -> Result<Ticket, ControllerError> {
        if options.timeout.is_none() {
            options.timeout = self.config.request_timeout;
        }

        let token = self.current.next();
        if let Some(previous) = self.in_flight() {
            log::debug!("Controller[{:?}]: {} supersedes {}", self.id, token, previous);
        }

        self.current = token;
        self.state = FetchState::loading(token);
        self.last_request = Some((url.clone(), options.clone()));

        log::debug!("Controller[{:?}]: fetching {} as {}", self.id, url, token);

        Ok(Ticket {
            token,
            url,
            options,
        })
    }
}

/// Turns a transport outcome into decoded data, or the reason it can't be.
fn resolve<T: DeserializeOwned>(outcome: Result<Response, TransportError>) -> Result<T, FetchError> {
    let resp = outcome?;
    if !resp.is_success() {
        return Err(FetchError::UnacceptableResponse {
            status: resp.status,
            status_text: resp.status_text,
        });
    }

    Ok(resp.json::<T>()?)
}

pub(crate) fn parse_url(url: &str) -> Result<Url, ControllerError> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(ControllerError::EmptyUrl);
    }

    let parsed = Url::parse(trimmed).map_err(|e| ControllerError::InvalidUrl {
        url: trimmed.to_string(),
        reason: e.to_string(),
    })?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(ControllerError::UnsupportedScheme(other.to_string())),
    }
}
