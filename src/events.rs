//! Commands and events exchanged between a [`FetchHandle`](crate::handle::FetchHandle)
//! and its worker.
//!
//! - [`FetchCommand`]: sent by handles to the worker, each with a oneshot reply.
//! - [`FetchEvent`]: broadcast by the worker for every lifecycle step.
//!
//! The fetched data itself is not part of any event; it is published through
//! the state watch channel.

use crate::controller::ControllerId;
use crate::errors::{ControllerError, FetchErrorKind};
use crate::net::RequestOptions;
use crate::state::RequestToken;
use tokio::sync::oneshot;

#[derive(Debug)]
pub enum FetchCommand {
    /// Fetch the given URL, superseding whatever is in flight
    Trigger {
        url: String,
        options: RequestOptions,
        reply: oneshot::Sender<Result<RequestToken, ControllerError>>,
    },
    /// Fetch the last URL again
    Refetch {
        reply: oneshot::Sender<Result<RequestToken, ControllerError>>,
    },
    /// Fetch the default URL (once per lifetime)
    Mount {
        reply: oneshot::Sender<Result<RequestToken, ControllerError>>,
    },
    /// Deactivate the controller and stop the worker
    Unmount { reply: oneshot::Sender<()> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchEvent {
    /// A fetch has been started
    LoadStarted {
        controller_id: ControllerId,
        token: RequestToken,
        url: String,
    },
    /// An in-flight fetch has been superseded by a newer one
    Superseded {
        controller_id: ControllerId,
        token: RequestToken,
        by: RequestToken,
    },
    /// The current fetch succeeded and its data is published
    LoadFinished {
        controller_id: ControllerId,
        token: RequestToken,
    },
    /// The current fetch failed
    LoadFailed {
        controller_id: ControllerId,
        token: RequestToken,
        kind: FetchErrorKind,
        message: String,
    },
    /// The outcome of a superseded fetch arrived and was dropped
    Discarded {
        controller_id: ControllerId,
        token: RequestToken,
    },
    /// The controller has been unmounted; no more events follow
    Unmounted { controller_id: ControllerId },
}

impl FetchEvent {
    /// Token of the fetch this event is about, if any
    pub fn token(&self) -> Option<RequestToken> {
        match self {
            FetchEvent::LoadStarted { token, .. }
            | FetchEvent::Superseded { token, .. }
            | FetchEvent::LoadFinished { token, .. }
            | FetchEvent::LoadFailed { token, .. }
            | FetchEvent::Discarded { token, .. } => Some(*token),
            FetchEvent::Unmounted { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_of_event() {
        let id = ControllerId::new();
        let t = RequestToken::NONE;

        let started = FetchEvent::LoadStarted {
            controller_id: id,
            token: t,
            url: "https://example.com/".into(),
        };
        assert_eq!(started.token(), Some(t));
        assert_eq!(FetchEvent::Unmounted { controller_id: id }.token(), None);
    }

    #[test]
    fn events_debug() {
        let e = FetchEvent::LoadFailed {
            controller_id: ControllerId::new(),
            token: RequestToken::NONE,
            kind: FetchErrorKind::NetworkFailure,
            message: "Request failed".into(),
        };
        let dbg = format!("{e:?}");
        assert!(dbg.contains("LoadFailed"));
        assert!(dbg.contains("NetworkFailure"));
    }
}
