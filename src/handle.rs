use crate::controller::ControllerId;
use crate::errors::ControllerError;
use crate::events::{FetchCommand, FetchEvent};
use crate::net::RequestOptions;
use crate::state::{FetchState, RequestToken};
use tokio::sync::{broadcast, mpsc, oneshot, watch};

/// Consumer side of a spawned controller, e.g. held by a rendering layer.
///
/// Handles are cheap to clone. All of them talk to the same worker, which keeps
/// running until [`on_unmount`](Self::on_unmount) is called or the last handle
/// is dropped.
#[derive(Clone)]
pub struct FetchHandle<T> {
    id: ControllerId,
    cmd_tx: mpsc::Sender<FetchCommand>,
    state_rx: watch::Receiver<FetchState<T>>,
    event_tx: broadcast::Sender<FetchEvent>,
}

impl<T: Clone> FetchHandle<T> {
    pub(crate) fn new(
        id: ControllerId,
        cmd_tx: mpsc::Sender<FetchCommand>,
        state_rx: watch::Receiver<FetchState<T>>,
        event_tx: broadcast::Sender<FetchEvent>,
    ) -> Self {
        Self {
            id,
            cmd_tx,
            state_rx,
            event_tx,
        }
    }

    pub fn id(&self) -> ControllerId {
        self.id
    }

    /// Starts fetching `url`. Returns once the controller is `Loading`.
    pub async fn trigger(&self, url: impl Into<String>) -> Result<RequestToken, ControllerError> {
        self.trigger_with(url, RequestOptions::default()).await
    }

    pub async fn trigger_with(
        &self,
        url: impl Into<String>,
        options: RequestOptions,
    ) -> Result<RequestToken, ControllerError> {
        let (tx, rx) = oneshot::channel();
        self.request(
            FetchCommand::Trigger {
                url: url.into(),
                options,
                reply: tx,
            },
            rx,
        )
        .await
    }

    /// Fetches the last URL again, e.g. from a "reload" button.
    pub async fn refetch(&self) -> Result<RequestToken, ControllerError> {
        let (tx, rx) = oneshot::channel();
        self.request(FetchCommand::Refetch { reply: tx }, rx).await
    }

    /// Fetches the configured default URL. Meant to be called once, when the
    /// consumer is mounted.
    pub async fn on_mount(&self) -> Result<RequestToken, ControllerError> {
        let (tx, rx) = oneshot::channel();
        self.request(FetchCommand::Mount { reply: tx }, rx).await
    }

    /// Deactivates the controller and waits for its worker to stop. The last
    /// state stays readable through [`current_state`](Self::current_state).
    pub async fn on_unmount(&self) {
        let (tx, rx) = oneshot::channel();
        if self.cmd_tx.send(FetchCommand::Unmount { reply: tx }).await.is_err() {
            // Already gone
            return;
        }
        let _ = rx.await;
    }

    /// Snapshot of the current state
    pub fn current_state(&self) -> FetchState<T> {
        self.state_rx.borrow().clone()
    }

    /// Waits until the state is `Success` or `Error` and returns it. If the
    /// controller is unmounted first, returns the state it was left in.
    pub async fn settled(&self) -> FetchState<T> {
        let mut rx = self.state_rx.clone();
        let res = rx.wait_for(|s| s.status().is_settled()).await.map(|s| s.clone());
        match res {
            Ok(state) => state,
            Err(_closed) => rx.borrow().clone(),
        }
    }

    /// Receiver that is notified on every state change
    pub fn watch_state(&self) -> watch::Receiver<FetchState<T>> {
        self.state_rx.clone()
    }

    /// Subscribes to lifecycle events. Only events sent from this point on are received.
    pub fn subscribe_events(&self) -> broadcast::Receiver<FetchEvent> {
        self.event_tx.subscribe()
    }

    /// True when the worker is no longer running
    pub fn is_closed(&self) -> bool {
        self.cmd_tx.is_closed()
    }

    async fn request(
        &self,
        cmd: FetchCommand,
        rx: oneshot::Receiver<Result<RequestToken, ControllerError>>,
    ) -> Result<RequestToken, ControllerError> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| ControllerError::Unmounted)?;
        rx.await.map_err(|_| ControllerError::Unmounted)?
    }
}
