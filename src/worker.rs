//! Async driver for a [`FetchController`].
//!
//! The worker owns the controller on a single tokio task. Transport calls run
//! on their own spawned tasks and report back over a completion channel, so the
//! controller is only ever touched from the worker loop and needs no lock.

use crate::config::ControllerConfig;
use crate::controller::{Completion, ControllerId, FetchController, Ticket};
use crate::errors::{ControllerError, TransportError};
use crate::events::{FetchCommand, FetchEvent};
use crate::handle::FetchHandle;
use crate::net::{HttpTransport, Response, Transport};
use crate::state::{FetchState, FetchStatus, RequestToken};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

type Outcome = (RequestToken, Result<Response, TransportError>);

/// Spawns a worker for a new controller and returns a handle to it.
///
/// Must be called from within a tokio runtime.
pub fn spawn<T>(config: ControllerConfig, transport: Arc<dyn Transport>) -> (FetchHandle<T>, JoinHandle<()>)
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    let (worker, handle) = FetchWorker::new(config, transport);
    let join_handle = tokio::spawn(worker.run());

    (handle, join_handle)
}

/// Same as [`spawn`], using an [`HttpTransport`] built from the config.
pub fn spawn_http<T>(config: ControllerConfig) -> Result<(FetchHandle<T>, JoinHandle<()>), TransportError>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    let transport = HttpTransport::new(&config.user_agent, config.request_timeout)?;
    Ok(spawn(config, Arc::new(transport)))
}

pub struct FetchWorker<T> {
    controller: FetchController<T>,
    transport: Arc<dyn Transport>,
    /// Commands from the handles. Closes once every handle is dropped.
    cmd_rx: mpsc::Receiver<FetchCommand>,
    /// Outcomes of spawned requests
    done_rx: mpsc::Receiver<Outcome>,
    done_tx: mpsc::Sender<Outcome>,
    state_tx: watch::Sender<FetchState<T>>,
    event_tx: broadcast::Sender<FetchEvent>,
    /// Cancellation tokens of the requests still running
    inflight: BTreeMap<RequestToken, CancellationToken>,
    /// Parent of all request tokens, fired on unmount
    shutdown: CancellationToken,
}

impl<T> FetchWorker<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Creates a new worker and the first handle to it. Does NOT spawn the worker.
    pub fn new(config: ControllerConfig, transport: Arc<dyn Transport>) -> (Self, FetchHandle<T>) {
        let capacity = config.channel_capacity.max(1);
        let (cmd_tx, cmd_rx) = mpsc::channel(capacity);
        let (done_tx, done_rx) = mpsc::channel(capacity);
        let (event_tx, _first_rx) = broadcast::channel(capacity);
        let (state_tx, state_rx) = watch::channel(FetchState::idle());

        let controller = FetchController::new(config);
        let handle = FetchHandle::new(controller.id(), cmd_tx, state_rx, event_tx.clone());

        let worker = Self {
            controller,
            transport,
            cmd_rx,
            done_rx,
            done_tx,
            state_tx,
            event_tx,
            inflight: BTreeMap::new(),
            shutdown: CancellationToken::new(),
        };

        (worker, handle)
    }

    pub fn id(&self) -> ControllerId {
        self.controller.id()
    }

    /// Main worker loop. Runs until unmounted or until every handle is dropped.
    pub async fn run(mut self) {
        let id = self.controller.id();
        log::debug!("Controller[{:?}]: worker started", id);

        let mut unmount_reply = None;

        loop {
            tokio::select! {
                msg = self.cmd_rx.recv() => {
                    let Some(cmd) = msg else {
                        log::debug!("Controller[{:?}]: all handles dropped", id);
                        break;
                    };

                    match cmd {
                        FetchCommand::Trigger { url, options, reply } => {
                            let _ = reply.send(self.start(|c| c.trigger(&url, options)));
                        }
                        FetchCommand::Refetch { reply } => {
                            let _ = reply.send(self.start(|c| c.refetch()));
                        }
                        FetchCommand::Mount { reply } => {
                            let _ = reply.send(self.start(|c| c.on_mount()));
                        }
                        FetchCommand::Unmount { reply } => {
                            unmount_reply = Some(reply);
                            break;
                        }
                    }
                }

                Some((token, outcome)) = self.done_rx.recv() => {
                    self.handle_completion(token, outcome);
                }
            }
        }

        // Cleanup. Requests still running are aborted and their outcomes never read.
        self.controller.on_unmount();
        self.shutdown.cancel();
        self.inflight.clear();
        let _ = self.event_tx.send(FetchEvent::Unmounted { controller_id: id });
        log::debug!("Controller[{:?}]: worker exiting", id);

        if let Some(reply) = unmount_reply {
            let _ = reply.send(());
        }
    }

    /// Runs `f` against the controller. If it hands out a ticket, publishes the
    /// new `Loading` state and dispatches the ticket to the transport.
    fn start(
        &mut self,
        f: impl FnOnce(&mut FetchController<T>) -> Result<Ticket, ControllerError>,
    ) -> Result<RequestToken, ControllerError> {
        let previous = self.controller.in_flight();
        let ticket = match f(&mut self.controller) {
            Ok(ticket) => ticket,
            Err(e) => {
                log::warn!("Controller[{:?}]: cannot start fetch: {}", self.controller.id(), e);
                return Err(e);
            }
        };
        let id = self.controller.id();
        let token = ticket.token;

        if let Some(previous) = previous {
            if self.controller.config().abort_superseded {
                if let Some(cancel) = self.inflight.remove(&previous) {
                    cancel.cancel();
                }
            }
            let _ = self.event_tx.send(FetchEvent::Superseded {
                controller_id: id,
                token: previous,
                by: token,
            });
        }

        self.publish();
        let _ = self.event_tx.send(FetchEvent::LoadStarted {
            controller_id: id,
            token,
            url: ticket.url.to_string(),
        });

        self.dispatch(ticket);
        Ok(token)
    }

    fn dispatch(&mut self, ticket: Ticket) {
        let cancel = self.shutdown.child_token();
        self.inflight.insert(ticket.token, cancel.clone());

        let transport = self.transport.clone();
        let done_tx = self.done_tx.clone();

        tokio::spawn(async move {
            let outcome = tokio::select! {
                _ = cancel.cancelled() => Err(TransportError::Canceled),
                res = transport.request(&ticket.url, &ticket.options) => res,
            };

            // The worker may be gone already, in which case nobody wants this
            let _ = done_tx.send((ticket.token, outcome)).await;
        });
    }

    fn handle_completion(&mut self, token: RequestToken, outcome: Result<Response, TransportError>) {
        self.inflight.remove(&token);
        let id = self.controller.id();

        match self.controller.complete(token, outcome) {
            Completion::Applied(status) => {
                self.publish();

                let event = match (status, self.controller.state().error()) {
                    (FetchStatus::Error, Some(failure)) => FetchEvent::LoadFailed {
                        controller_id: id,
                        token,
                        kind: failure.kind(),
                        message: failure.message().to_string(),
                    },
                    _ => FetchEvent::LoadFinished {
                        controller_id: id,
                        token,
                    },
                };
                let _ = self.event_tx.send(event);
            }
            Completion::Stale => {
                let _ = self.event_tx.send(FetchEvent::Discarded {
                    controller_id: id,
                    token,
                });
            }
            Completion::Inactive => {}
        }
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.controller.current_state());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FetchErrorKind;
    use crate::net::RequestOptions;
    use async_trait::async_trait;
    use serde::Deserialize;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::oneshot;
    use url::Url;

    type Reply = Result<Response, TransportError>;

    /// Transport whose responses are released by the test, one gate per request.
    #[derive(Default)]
    struct GatedTransport {
        gates: Mutex<HashMap<String, VecDeque<oneshot::Receiver<Reply>>>>,
    }

    impl GatedTransport {
        fn gate(&self, url: &str) -> oneshot::Sender<Reply> {
            let (tx, rx) = oneshot::channel();
            self.gates
                .lock()
                .unwrap()
                .entry(url.to_string())
                .or_default()
                .push_back(rx);
            tx
        }
    }

    #[async_trait]
    impl Transport for GatedTransport {
        async fn request(&self, url: &Url, _options: &RequestOptions) -> Result<Response, TransportError> {
            let gate = self
                .gates
                .lock()
                .unwrap()
                .get_mut(url.as_str())
                .and_then(|q| q.pop_front());

            match gate {
                Some(rx) => rx.await.unwrap_or(Err(TransportError::Canceled)),
                None => Err(TransportError::Other(format!("no gate for {url}"))),
            }
        }
    }

    #[derive(Debug, Clone, Deserialize, PartialEq)]
    struct User {
        id: u32,
        name: String,
    }

    const A: &str = "https://api.example.com/a";
    const B: &str = "https://api.example.com/b";
    const ANN: &str = r#"[{"id":1,"name":"Ann"}]"#;
    const BOB: &str = r#"[{"id":2,"name":"Bob"}]"#;

    fn reply(url: &str, status: u16, body: &str) -> Reply {
        Ok(Response::new(Url::parse(url).unwrap(), status, body))
    }

    fn config(abort_superseded: bool) -> ControllerConfig {
        ControllerConfig::builder()
            .default_url(A)
            .abort_superseded(abort_superseded)
            .build()
            .unwrap()
    }

    async fn wait_for_event(
        rx: &mut broadcast::Receiver<FetchEvent>,
        pred: impl Fn(&FetchEvent) -> bool,
    ) -> FetchEvent {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let ev = rx.recv().await.expect("event channel closed");
                if pred(&ev) {
                    return ev;
                }
            }
        })
        .await
        .expect("timed out waiting for event")
    }

    #[tokio::test]
    async fn trigger_publishes_loading_then_success() {
        let transport = Arc::new(GatedTransport::default());
        let gate = transport.gate(A);
        let (handle, _join) = spawn::<Vec<User>>(config(true), transport.clone());

        let token = handle.trigger(A).await.unwrap();
        let s = handle.current_state();
        assert_eq!(s.status(), FetchStatus::Loading);
        assert_eq!(s.token(), token);

        gate.send(reply(A, 200, ANN)).unwrap();
        let s = handle.settled().await;
        assert_eq!(s.status(), FetchStatus::Success);
        assert_eq!(s.data().unwrap()[0].name, "Ann");
    }

    #[tokio::test]
    async fn late_stale_result_is_discarded() {
        let transport = Arc::new(GatedTransport::default());
        let gate_a = transport.gate(A);
        let gate_b = transport.gate(B);
        let (handle, _join) = spawn::<Vec<User>>(config(false), transport.clone());
        let mut events = handle.subscribe_events();

        let a = handle.trigger(A).await.unwrap();
        let b = handle.trigger(B).await.unwrap();

        gate_b.send(reply(B, 200, BOB)).unwrap();
        let s = handle.settled().await;
        assert_eq!(s.token(), b);
        assert_eq!(s.data().unwrap()[0].name, "Bob");

        // A resolves after B
        gate_a.send(reply(A, 200, ANN)).unwrap();
        wait_for_event(&mut events, |e| matches!(e, FetchEvent::Discarded { token, .. } if *token == a)).await;

        let s = handle.current_state();
        assert_eq!(s.token(), b);
        assert_eq!(s.data().unwrap()[0].name, "Bob");
    }

    #[tokio::test]
    async fn superseded_request_is_aborted() {
        let transport = Arc::new(GatedTransport::default());
        let _gate_a = transport.gate(A);
        let gate_b = transport.gate(B);
        let (handle, _join) = spawn::<Vec<User>>(config(true), transport.clone());
        let mut events = handle.subscribe_events();

        let a = handle.trigger(A).await.unwrap();
        let b = handle.trigger(B).await.unwrap();

        let ev = wait_for_event(&mut events, |e| matches!(e, FetchEvent::Superseded { .. })).await;
        assert_eq!(ev, FetchEvent::Superseded { controller_id: handle.id(), token: a, by: b });

        // A never got a response, the abort produces the (dropped) outcome
        wait_for_event(&mut events, |e| matches!(e, FetchEvent::Discarded { token, .. } if *token == a)).await;
        assert_eq!(handle.current_state().status(), FetchStatus::Loading);

        gate_b.send(reply(B, 200, BOB)).unwrap();
        let s = handle.settled().await;
        assert_eq!(s.token(), b);
        assert_eq!(s.status(), FetchStatus::Success);
    }

    #[tokio::test]
    async fn failures_are_reported_with_client_message() {
        let transport = Arc::new(GatedTransport::default());
        let gate = transport.gate(A);
        let (handle, _join) = spawn::<Vec<User>>(config(true), transport.clone());
        let mut events = handle.subscribe_events();

        let token = handle.trigger(A).await.unwrap();
        gate.send(reply(A, 404, "gone fishing")).unwrap();

        let ev = wait_for_event(&mut events, |e| matches!(e, FetchEvent::LoadFailed { .. })).await;
        assert_eq!(
            ev,
            FetchEvent::LoadFailed {
                controller_id: handle.id(),
                token,
                kind: FetchErrorKind::UnacceptableResponse,
                message: "Sorry something went wrong".into(),
            }
        );

        let s = handle.current_state();
        assert_eq!(s.error_message(), Some("Sorry something went wrong"));
        assert!(s.data().is_none());
    }

    #[tokio::test]
    async fn network_failure_is_reported() {
        let transport = Arc::new(GatedTransport::default());
        let gate = transport.gate(A);
        let (handle, _join) = spawn::<Vec<User>>(config(true), transport.clone());

        handle.trigger(A).await.unwrap();
        gate.send(Err(TransportError::Other("connection refused".into()))).unwrap();

        let s = handle.settled().await;
        assert_eq!(s.status(), FetchStatus::Error);
        assert_eq!(s.error().unwrap().kind(), FetchErrorKind::NetworkFailure);
        assert_eq!(s.error_message(), Some("Request failed"));
    }

    #[tokio::test]
    async fn unmount_while_in_flight_freezes_state() {
        let transport = Arc::new(GatedTransport::default());
        let gate = transport.gate(A);
        let (handle, join) = spawn::<Vec<User>>(config(false), transport.clone());

        let token = handle.trigger(A).await.unwrap();
        handle.on_unmount().await;
        join.await.unwrap();

        // The response arrives after teardown; nobody is listening anymore
        let _ = gate.send(reply(A, 200, ANN));
        tokio::task::yield_now().await;

        let s = handle.current_state();
        assert_eq!(s.status(), FetchStatus::Loading);
        assert_eq!(s.token(), token);
        assert!(s.data().is_none());

        assert_eq!(handle.trigger(B).await, Err(ControllerError::Unmounted));
        assert_eq!(handle.refetch().await, Err(ControllerError::Unmounted));

        // Settling a dead controller returns the frozen state
        assert_eq!(handle.settled().await.token(), token);

        // Unmounting twice is fine
        handle.on_unmount().await;
    }

    #[tokio::test]
    async fn mount_fetches_default_url_once() {
        let transport = Arc::new(GatedTransport::default());
        let gate = transport.gate(A);
        let (handle, _join) = spawn::<Vec<User>>(config(true), transport.clone());

        handle.on_mount().await.unwrap();
        assert_eq!(handle.on_mount().await, Err(ControllerError::AlreadyMounted));

        gate.send(reply(A, 200, ANN)).unwrap();
        assert_eq!(handle.settled().await.status(), FetchStatus::Success);
    }

    #[tokio::test]
    async fn refetch_on_demand() {
        let transport = Arc::new(GatedTransport::default());
        let first = transport.gate(A);
        let second = transport.gate(A);
        let (handle, _join) = spawn::<Vec<User>>(config(true), transport.clone());

        assert_eq!(handle.refetch().await, Err(ControllerError::NothingToRefetch));

        handle.trigger(A).await.unwrap();
        first.send(reply(A, 500, "")).unwrap();
        assert_eq!(handle.settled().await.status(), FetchStatus::Error);

        // "Try again" button
        let token = handle.refetch().await.unwrap();
        assert_eq!(handle.current_state().status(), FetchStatus::Loading);
        second.send(reply(A, 200, ANN)).unwrap();

        let s = handle.settled().await;
        assert_eq!(s.token(), token);
        assert_eq!(s.status(), FetchStatus::Success);
    }

    #[tokio::test]
    async fn invalid_trigger_leaves_state_alone() {
        let transport = Arc::new(GatedTransport::default());
        let (handle, _join) = spawn::<Vec<User>>(config(true), transport.clone());

        assert_eq!(handle.trigger("").await, Err(ControllerError::EmptyUrl));
        assert_eq!(handle.current_state().status(), FetchStatus::Idle);
    }

    #[tokio::test]
    async fn dropping_all_handles_stops_worker() {
        let transport = Arc::new(GatedTransport::default());
        let (handle, join) = spawn::<Vec<User>>(config(true), transport.clone());
        let other = handle.clone();

        drop(handle);
        drop(other);

        tokio::time::timeout(Duration::from_secs(5), join)
            .await
            .expect("worker did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn unmount_replies_after_worker_stopped() {
        let transport = Arc::new(GatedTransport::default());
        let (handle, join) = spawn::<Vec<User>>(config(true), transport.clone());
        let mut events = handle.subscribe_events();

        handle.on_unmount().await;

        // Unmounted goes out before the reply
        let ev = wait_for_event(&mut events, |e| matches!(e, FetchEvent::Unmounted { .. })).await;
        assert_eq!(ev, FetchEvent::Unmounted { controller_id: handle.id() });

        tokio::time::timeout(Duration::from_secs(5), join)
            .await
            .expect("worker did not stop")
            .unwrap();
        assert!(handle.is_closed());
        assert_eq!(handle.on_mount().await, Err(ControllerError::Unmounted));
        assert_eq!(handle.current_state().status(), FetchStatus::Idle);
    }

    #[tokio::test]
    async fn watchers_see_every_transition() {
        let transport = Arc::new(GatedTransport::default());
        let gate = transport.gate(A);
        let (handle, _join) = spawn::<Vec<User>>(config(true), transport.clone());
        let mut rx = handle.watch_state();
        assert_eq!(rx.borrow_and_update().status(), FetchStatus::Idle);

        let token = handle.trigger(A).await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().status(), FetchStatus::Loading);

        gate.send(reply(A, 200, ANN)).unwrap();
        rx.changed().await.unwrap();
        let s = rx.borrow_and_update().clone();
        assert_eq!(s.status(), FetchStatus::Success);
        assert_eq!(s.token(), token);

        let users = s.into_data().unwrap();
        assert_eq!(users, vec![User { id: 1, name: "Ann".into() }]);
    }
}
