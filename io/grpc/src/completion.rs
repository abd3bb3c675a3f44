//! Completion handles for asynchronous sends.
//!
//! Every send on a response returns a [`Completion`]. The transport resolves
//! it once it has accepted (not necessarily flushed) the bytes. The handle
//! can be awaited, inspected synchronously, or given a callback; all three
//! observe the same single result.

use crate::error::Error;

use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll, Waker};

type Callback = Box<dyn FnOnce(&Result<(), Error>) + Send>;

enum State {
    Pending {
        wakers: Vec<Waker>,
        callbacks: Vec<Callback>,
    },
    Done(Result<(), Error>),
}

/// Shared, resolve-once handle for the outcome of a send.
///
/// Cloning yields another handle to the same outcome. The first call to
/// [`complete`](Completion::complete) wins; later calls are ignored.
#[derive(Clone)]
pub struct Completion {
    inner: Arc<Mutex<State>>,
}

impl Completion {
    /// Create an unresolved completion.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(State::Pending {
                wakers: Vec::new(),
                callbacks: Vec::new(),
            })),
        }
    }

    /// Create a completion that has already succeeded.
    pub fn succeeded() -> Self {
        Self::resolved(Ok(()))
    }

    /// Create a completion that has already failed.
    pub fn failed(error: Error) -> Self {
        Self::resolved(Err(error))
    }

    fn resolved(result: Result<(), Error>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(State::Done(result))),
        }
    }

    /// Resolve the completion.
    ///
    /// Returns `false` if it had already been resolved, in which case
    /// `result` is discarded.
    pub fn complete(&self, result: Result<(), Error>) -> bool {
        let (wakers, callbacks) = {
            let mut state = self.inner.lock();
            match &mut *state {
                State::Done(_) => return false,
                State::Pending { wakers, callbacks } => {
                    let wakers = std::mem::take(wakers);
                    let callbacks = std::mem::take(callbacks);
                    *state = State::Done(result.clone());
                    (wakers, callbacks)
                }
            }
        };

        // Callbacks may register further work on this handle.
        for callback in callbacks {
            callback(&result);
        }
        for waker in wakers {
            waker.wake();
        }
        true
    }

    /// Whether the completion has been resolved.
    pub fn is_complete(&self) -> bool {
        matches!(*self.inner.lock(), State::Done(_))
    }

    /// The outcome, if resolved.
    pub fn result(&self) -> Option<Result<(), Error>> {
        match &*self.inner.lock() {
            State::Done(result) => Some(result.clone()),
            State::Pending { .. } => None,
        }
    }

    /// Run `f` once the completion resolves, immediately if it already has.
    pub fn on_complete<F>(&self, f: F)
    where
        F: FnOnce(&Result<(), Error>) + Send + 'static,
    {
        let mut state = self.inner.lock();
        match &mut *state {
            State::Pending { callbacks, .. } => callbacks.push(Box::new(f)),
            State::Done(result) => {
                let result = result.clone();
                drop(state);
                f(&result);
            }
        }
    }

    /// A completion that succeeds once every input has succeeded, or fails
    /// with the first failure observed.
    pub fn all(completions: impl IntoIterator<Item = Completion>) -> Completion {
        let completions: Vec<_> = completions.into_iter().collect();
        match completions.len() {
            0 => return Completion::succeeded(),
            1 => return completions.into_iter().next().unwrap_or_default(),
            _ => {}
        }

        let combined = Completion::new();
        let remaining = Arc::new(AtomicUsize::new(completions.len()));
        for completion in completions {
            let combined = combined.clone();
            let remaining = remaining.clone();
            completion.on_complete(move |result| match result {
                Err(e) => {
                    combined.complete(Err(e.clone()));
                }
                Ok(()) => {
                    if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                        combined.complete(Ok(()));
                    }
                }
            });
        }
        combined
    }
}

impl Default for Completion {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.inner.lock() {
            State::Pending { .. } => f.write_str("Completion(pending)"),
            State::Done(result) => write!(f, "Completion({:?})", result),
        }
    }
}

impl Future for Completion {
    type Output = Result<(), Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.inner.lock();
        match &mut *state {
            State::Done(result) => Poll::Ready(result.clone()),
            State::Pending { wakers, .. } => {
                if !wakers.iter().any(|w| w.will_wake(cx.waker())) {
                    wakers.push(cx.waker().clone());
                }
                Poll::Pending
            }
        }
    }
}
