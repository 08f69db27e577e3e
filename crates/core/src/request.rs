//! One-shot rendezvous between a blocked worker and the GUI thread.
//!
//! When the domain runtime asks the operator for a value, the worker thread
//! blocks in [`RequestHandler::get_data`] until the GUI thread calls
//! [`RequestHandler::send_data`] or the request is cancelled.

use crate::error::RequestError;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;

/// Resolution of a user request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome<T> {
    Answered(T),
    /// The job was stopped or the manager went away before an answer.
    Cancelled,
}

impl<T> RequestOutcome<T> {
    pub fn answered(self) -> Option<T> {
        match self {
            RequestOutcome::Answered(value) => Some(value),
            RequestOutcome::Cancelled => None,
        }
    }
}

/// Single-use value exchange between two threads.
///
/// Exactly one `send_data` and one `get_data` per instance. A second call of
/// either is a programming error: it returns a [`RequestError`] and panics in
/// debug builds.
#[derive(Debug)]
pub struct RequestHandler<T> {
    tx: Mutex<Option<oneshot::Sender<T>>>,
    rx: Mutex<Option<oneshot::Receiver<T>>>,
}

fn take<S>(slot: &Mutex<Option<S>>) -> Option<S> {
    slot.lock().unwrap_or_else(PoisonError::into_inner).take()
}

impl<T> Default for RequestHandler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RequestHandler<T> {
    pub fn new() -> Self {
        let (tx, rx) = oneshot::channel();
        Self {
            tx: Mutex::new(Some(tx)),
            rx: Mutex::new(Some(rx)),
        }
    }

    /// Hands `value` to the waiting side.
    ///
    /// Succeeds even when the waiting side has already gone away.
    pub fn send_data(&self, value: T) -> Result<(), RequestError> {
        let Some(tx) = take(&self.tx) else {
            debug_assert!(false, "request handler answered twice");
            return Err(RequestError::AlreadyAnswered);
        };
        // The receiver may have been dropped by a stopped worker.
        let _ = tx.send(value);
        Ok(())
    }

    /// Blocks the calling thread until the request is answered or cancelled.
    ///
    /// Must not be called from within an async runtime.
    pub fn get_data(&self) -> Result<RequestOutcome<T>, RequestError> {
        let Some(rx) = take(&self.rx) else {
            debug_assert!(false, "request handler consumed twice");
            return Err(RequestError::AlreadyConsumed);
        };
        Ok(match rx.blocking_recv() {
            Ok(value) => RequestOutcome::Answered(value),
            Err(_) => RequestOutcome::Cancelled,
        })
    }

    /// Resolves the request as `Cancelled`; no-op once answered.
    pub fn cancel(&self) {
        drop(take(&self.tx));
    }

    /// True until the request is answered or cancelled.
    pub fn is_pending(&self) -> bool {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|tx| !tx.is_closed())
    }
}

/// A request waiting for an operator decision.
#[derive(Debug, Clone)]
pub enum PendingRequest {
    Choice {
        handler: Arc<RequestHandler<usize>>,
        options: usize,
    },
    Input(Arc<RequestHandler<Value>>),
}

impl PendingRequest {
    fn cancel(&self) {
        match self {
            PendingRequest::Choice { handler, .. } => handler.cancel(),
            PendingRequest::Input(handler) => handler.cancel(),
        }
    }
}

/// What became of an answer to a choice request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// No pending choice under that id.
    NotPending,
    /// The index is not one of the offered options; the request stays open.
    OutOfRange { options: usize },
}

#[derive(Debug, Default)]
struct Registry {
    closed: bool,
    next_id: u64,
    pending: BTreeMap<u64, PendingRequest>,
}

/// Outstanding user requests of one run.
///
/// Shared between the worker, which opens requests, and the job manager,
/// which answers or cancels them. Once [`cancel_all`](Self::cancel_all) has
/// run, new requests are refused so a stopped worker never blocks again.
#[derive(Debug, Default)]
pub struct PendingRequests {
    inner: Mutex<Registry>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn open(&self, request: PendingRequest) -> Option<u64> {
        let mut registry = self.lock();
        if registry.closed {
            return None;
        }
        registry.next_id += 1;
        let id = registry.next_id;
        registry.pending.insert(id, request);
        Some(id)
    }

    /// Registers a user-choice request over `options` choices; `None` once
    /// cancelled.
    pub fn open_choice(&self, options: usize) -> Option<(u64, Arc<RequestHandler<usize>>)> {
        let handler = Arc::new(RequestHandler::new());
        self.open(PendingRequest::Choice {
            handler: Arc::clone(&handler),
            options,
        })
        .map(|id| (id, handler))
    }

    /// Registers a user-input request; `None` once cancelled.
    pub fn open_input(&self) -> Option<(u64, Arc<RequestHandler<Value>>)> {
        let handler = Arc::new(RequestHandler::new());
        self.open(PendingRequest::Input(Arc::clone(&handler)))
            .map(|id| (id, handler))
    }

    /// Answers a pending choice request.
    pub fn answer_choice(&self, id: u64, index: usize) -> Delivery {
        let mut registry = self.lock();
        match registry.pending.remove(&id) {
            Some(PendingRequest::Choice { handler, options }) if index >= options => {
                registry
                    .pending
                    .insert(id, PendingRequest::Choice { handler, options });
                Delivery::OutOfRange { options }
            }
            Some(PendingRequest::Choice { handler, .. }) => {
                if handler.send_data(index).is_ok() {
                    Delivery::Delivered
                } else {
                    Delivery::NotPending
                }
            }
            Some(other) => {
                registry.pending.insert(id, other);
                Delivery::NotPending
            }
            None => Delivery::NotPending,
        }
    }

    /// Answers a pending input request. Returns false if `id` is not a
    /// pending input.
    pub fn answer_input(&self, id: u64, value: Value) -> bool {
        let mut registry = self.lock();
        match registry.pending.remove(&id) {
            Some(PendingRequest::Input(handler)) => handler.send_data(value).is_ok(),
            Some(other) => {
                registry.pending.insert(id, other);
                false
            }
            None => false,
        }
    }

    /// Cancels one request, e.g. when the dialog was dismissed.
    pub fn cancel(&self, id: u64) -> bool {
        match self.lock().pending.remove(&id) {
            Some(request) => {
                request.cancel();
                true
            }
            None => false,
        }
    }

    /// Forgets a request the worker has stopped waiting for.
    pub fn finish(&self, id: u64) {
        self.lock().pending.remove(&id);
    }

    /// Cancels every outstanding request and refuses new ones.
    pub fn cancel_all(&self) {
        let mut registry = self.lock();
        registry.closed = true;
        for (_, request) in std::mem::take(&mut registry.pending) {
            request.cancel();
        }
    }

    pub fn len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
