//! One-shot completion handles.
//!
//! Every operation returns a [`Completion`] at once. It resolves exactly once,
//! from the reactor thread, with the result or the error. Await it from async
//! code or call [`Completion::wait`] from a plain thread.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use super::codec::Reply;
use super::error::{Error, Result};

type Convert<T> = Box<dyn FnOnce(Reply) -> Result<T> + Send>;

/// Reactor side of a [`Completion`].
#[derive(Debug)]
pub(crate) struct Responder {
    tx: oneshot::Sender<Result<Reply>>,
    cancelled: Arc<AtomicBool>,
}

impl Responder {
    /// Check whether the caller gave up on the result.
    pub(crate) fn is_abandoned(&self) -> bool {
        self.tx.is_closed() || self.cancelled.load(Ordering::Acquire)
    }

    /// Deliver the outcome. A dropped handle is not an error.
    pub(crate) fn complete(self, result: Result<Reply>) {
        let _ = self.tx.send(result);
    }
}

enum State<T> {
    Ready(Option<Result<T>>),
    Pending {
        rx: oneshot::Receiver<Result<Reply>>,
        convert: Option<Convert<T>>,
    },
}

/// Handle to the eventual outcome of an operation.
#[must_use = "dropping a Completion cancels the request if it has not been sent"]
pub struct Completion<T> {
    state: State<T>,
    cancelled: Arc<AtomicBool>,
}

impl<T> Completion<T> {
    /// A handle plus the responder that resolves it. `convert` shapes the
    /// raw reply into the caller's type.
    pub(crate) fn channel(
        convert: impl FnOnce(Reply) -> Result<T> + Send + 'static,
    ) -> (Self, Responder) {
        let (tx, rx) = oneshot::channel();
        let cancelled = Arc::new(AtomicBool::new(false));
        let handle = Self {
            state: State::Pending {
                rx,
                convert: Some(Box::new(convert)),
            },
            cancelled: cancelled.clone(),
        };
        (handle, Responder { tx, cancelled })
    }

    /// An already resolved handle.
    pub fn ready(result: Result<T>) -> Self {
        Self {
            state: State::Ready(Some(result)),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Ask the reactor to drop the request. Takes effect only while the
    /// request has not been written; afterwards the kernel's answer still
    /// arrives.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check if [`cancel`](Self::cancel) was called.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Block the current thread until the outcome is known.
    ///
    /// # Panics
    ///
    /// Panics when called from within an async execution context; await
    /// the handle there instead.
    pub fn wait(self) -> Result<T> {
        match self.state {
            State::Ready(mut result) => result.take().unwrap_or(Err(Error::Shutdown)),
            State::Pending { rx, convert } => {
                let reply = rx.blocking_recv().map_err(|_| Error::Shutdown)??;
                match convert {
                    Some(convert) => convert(reply),
                    None => Err(Error::Shutdown),
                }
            }
        }
    }
}

// The result is never pinned in place.
impl<T> Unpin for Completion<T> {}

impl<T> Future for Completion<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match &mut this.state {
            State::Ready(result) => Poll::Ready(result.take().unwrap_or(Err(Error::Shutdown))),
            State::Pending { rx, convert } => {
                let outcome = match Pin::new(rx).poll(cx) {
                    Poll::Pending => return Poll::Pending,
                    Poll::Ready(outcome) => outcome,
                };
                let reply = match outcome {
                    Ok(Ok(reply)) => reply,
                    Ok(Err(e)) => return Poll::Ready(Err(e)),
                    Err(_) => return Poll::Ready(Err(Error::Shutdown)),
                };
                Poll::Ready(match convert.take() {
                    Some(convert) => convert(reply),
                    None => Err(Error::Shutdown),
                })
            }
        }
    }
}

impl<T> fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.state {
            State::Ready(_) => "ready",
            State::Pending { .. } => "pending",
        };
        f.debug_struct("Completion")
            .field("state", &state)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
