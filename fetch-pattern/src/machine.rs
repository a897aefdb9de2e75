//! The single-request state machine.
//!
//! Each machine owns a state-holder (a `watch` channel whose only sender
//! belongs to the request task), an unmount flag, and at most one pending
//! request. The request runs on its own tokio task; readers only ever see
//! snapshots.

use serde::de::DeserializeOwned;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use uuid::Uuid;

use crate::error::FetchError;
use crate::state::{FetchState, FetchStatus};
use crate::telemetry::log_error;
use crate::transport::{
    FetchRequest, Transport, TransportError, TransportResponse,
};

type StateSender<T> = watch::Sender<FetchState<T>>;
type RequestTask = Pin<Box<dyn Future<Output = ()> + Send>>;

const NO_RUNTIME_MESSAGE: &str =
    "Request not started: no tokio runtime is running";

/// A request that has been prepared but not yet launched.
struct Pending<T> {
    sender: StateSender<T>,
    launch: Box<dyn FnOnce(StateSender<T>) -> RequestTask + Send>,
}

/// Runs exactly one fetch and tracks its lifecycle as a [`FetchState`].
///
/// [`spawn`](Self::spawn) starts the request immediately. A machine built
/// with [`new`](Self::new) stays `Unloaded` until [`start`](Self::start) is
/// called; later calls to `start` do nothing. To fetch again, build a new
/// machine.
///
/// Once [`mark_unmounted`](Self::mark_unmounted) has been called (or the
/// machine has been dropped), the state is frozen. The in-flight request is
/// not aborted, but its outcome is discarded.
pub struct FetchStateMachine<T> {
    id: Uuid,
    state: watch::Receiver<FetchState<T>>,
    unmounted: Arc<AtomicBool>,
    pending: Mutex<Option<Pending<T>>>,
}

impl<T> FetchStateMachine<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    /// Build a machine and start its request at once.
    ///
    /// Outside a tokio runtime the machine goes straight to `Error`.
    pub fn spawn<Tr: Transport>(transport: Tr, request: FetchRequest) -> Self {
        let machine = Self::new(transport, request);
        machine.start();
        machine
    }

    /// Build an `Unloaded` machine. Nothing is sent until
    /// [`start`](Self::start).
    pub fn new<Tr: Transport>(transport: Tr, request: FetchRequest) -> Self {
        let id = Uuid::new_v4();
        let (sender, state) = watch::channel(FetchState::Unloaded);
        let unmounted = Arc::new(AtomicBool::new(false));

        let launch = {
            let unmounted = unmounted.clone();
            move |sender: StateSender<T>| -> RequestTask {
                Box::pin(execute(id, transport, request, sender, unmounted))
            }
        };

        Self {
            id,
            state,
            unmounted,
            pending: Mutex::new(Some(Pending {
                sender,
                launch: Box::new(launch),
            })),
        }
    }

    /// Move to `Loading` and launch the request on a new tokio task.
    ///
    /// Returns false without doing anything if the request was already
    /// launched or the machine has been unmounted. Outside a tokio runtime
    /// nothing is sent, the state becomes `Error`, and false is returned.
    pub fn start(&self) -> bool {
        let pending = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(Pending { sender, launch }) = pending else {
            tracing::debug!(id = %self.id, "request already started");
            return false;
        };

        let unmounted = &self.unmounted;
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::error!(id = %self.id, "no tokio runtime for the request");
            sender.send_if_modified(|state| {
                if unmounted.load(Ordering::Acquire) {
                    return false;
                }
                *state = FetchState::Error {
                    message: NO_RUNTIME_MESSAGE.to_string(),
                };
                true
            });
            return false;
        };

        let started = sender.send_if_modified(|state| {
            if unmounted.load(Ordering::Acquire) {
                return false;
            }
            *state = FetchState::Loading;
            true
        });
        if !started {
            tracing::debug!(id = %self.id, "machine already unmounted");
            return false;
        }

        runtime.spawn(launch(sender));
        true
    }
}

impl<T> FetchStateMachine<T> {
    /// Identifies this machine in logs.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Freeze the state. Safe to call any number of times, at any point.
    pub fn mark_unmounted(&self) {
        // Holding the read lock orders this against the request task's
        // final write, which checks the flag under the write lock.
        let _snapshot = self.state.borrow();
        self.unmounted.store(true, Ordering::Release);
    }

    pub fn is_unmounted(&self) -> bool {
        self.unmounted.load(Ordering::Acquire)
    }

    pub fn status(&self) -> FetchStatus {
        self.state.borrow().status()
    }

    pub fn is_unloaded(&self) -> bool {
        self.state.borrow().is_unloaded()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading()
    }

    pub fn is_loaded(&self) -> bool {
        self.state.borrow().is_loaded()
    }

    pub fn is_error(&self) -> bool {
        self.state.borrow().is_error()
    }

    pub fn error_message(&self) -> Option<String> {
        self.state.borrow().error_message().map(str::to_string)
    }

    /// A receiver that is notified on every transition.
    pub fn subscribe(&self) -> watch::Receiver<FetchState<T>> {
        self.state.clone()
    }

    fn has_pending(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl<T: Clone> FetchStateMachine<T> {
    /// A snapshot of the current state.
    pub fn state(&self) -> FetchState<T> {
        self.state.borrow().clone()
    }

    pub fn data(&self) -> Option<T> {
        self.state.borrow().data().cloned()
    }

    /// Wait for the request task to finish and return the final state.
    ///
    /// Returns the current state at once if the request was never started.
    pub async fn settled(&self) -> FetchState<T> {
        if self.has_pending() {
            return self.state();
        }
        let mut state = self.state.clone();
        // The task owns the only sender; the channel closes when it ends.
        while state.changed().await.is_ok() {}
        state.borrow().clone()
    }
}

impl<T> Drop for FetchStateMachine<T> {
    fn drop(&mut self) {
        self.mark_unmounted();
    }
}

impl<T> std::fmt::Debug for FetchStateMachine<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchStateMachine")
            .field("id", &self.id)
            .field("status", &self.status())
            .field("unmounted", &self.is_unmounted())
            .finish()
    }
}

#[tracing::instrument(
    name = "fetch",
    skip_all,
    fields(id = %id, method = %request.method, url = %request.url)
)]
async fn execute<T, Tr>(
    id: Uuid,
    transport: Tr,
    request: FetchRequest,
    sender: StateSender<T>,
    unmounted: Arc<AtomicBool>,
) where
    T: DeserializeOwned,
    Tr: Transport,
{
    tracing::debug!("request started");
    let result = transport.execute(&request).await;

    if unmounted.load(Ordering::Acquire) {
        tracing::debug!("unmounted before the response arrived");
        return;
    }

    let next = match decode_response::<T>(result) {
        Ok(data) => {
            tracing::debug!("loaded");
            FetchState::Loaded { data }
        }
        Err(e) => {
            let message = e.state_message();
            log_error(e);
            FetchState::Error { message }
        }
    };

    let written = sender.send_if_modified(|state| {
        if unmounted.load(Ordering::Acquire) {
            return false;
        }
        *state = next;
        true
    });
    if !written {
        tracing::debug!("unmounted while decoding, discarding the response");
    }
}

/// Turn a transport outcome into the decoded payload.
fn decode_response<T: DeserializeOwned>(
    result: Result<TransportResponse, TransportError>,
) -> Result<T, FetchError> {
    let response = result?;
    if !response.is_success() {
        return Err(FetchError::Status(response.status, response.text()));
    }
    Ok(serde_json::from_slice(&response.body)?)
}
