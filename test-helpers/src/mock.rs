//! A transport with a scripted outcome.
//!
//! The outcome can be held back behind a gate so tests can observe the
//! machine while the request is still in flight, then release it.

use fetch_pattern::{
    FetchRequest, Transport, TransportError, TransportResponse,
};
use reqwest::StatusCode;
use serde::Serialize;
use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Notify;

pub struct ScriptedTransport {
    outcome: Mutex<Option<Result<TransportResponse, TransportError>>>,
    gate: Option<Notify>,
    calls: AtomicUsize,
    requests: Mutex<Vec<FetchRequest>>,
}

impl ScriptedTransport {
    fn new(outcome: Result<TransportResponse, TransportError>) -> Self {
        Self {
            outcome: Mutex::new(Some(outcome)),
            gate: None,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Resolve with the given status and raw body.
    pub fn respond(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self::new(Ok(TransportResponse::new(status, body)))
    }

    /// Resolve with the given status and a JSON body.
    pub fn respond_json(status: StatusCode, body: &impl Serialize) -> Self {
        let body = serde_json::to_vec(body).unwrap();
        Self::respond(status, body)
    }

    /// Fail the call itself with the given message.
    pub fn fail(message: &str) -> Self {
        Self::new(Err(TransportError::Failed(message.to_string())))
    }

    /// Hold the outcome back until [`release`](Self::release) is called.
    pub fn gated(mut self) -> Self {
        self.gate = Some(Notify::new());
        self
    }

    /// Let a gated call resolve. May be called before the call starts.
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    /// Number of times `execute` has been called.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every request passed to `execute`, in order.
    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Transport for ScriptedTransport {
    fn execute(
        &self,
        request: &FetchRequest,
    ) -> impl Future<Output = Result<TransportResponse, TransportError>> + Send
    {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        async move {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            let outcome = self.outcome.lock().unwrap().take();
            outcome.unwrap_or_else(|| {
                Err(TransportError::Failed("no scripted outcome left".into()))
            })
        }
    }
}
