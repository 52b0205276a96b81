//! One-shot completion of an asynchronous call.
//!
//! A [`Completion`] is consumed when it fires, so a caller is completed at
//! most once. Dropping it without firing abandons the call: callbacks are never
//! invoked and an awaiting [`Pending`] resolves to [`BridgeError::Abandoned`].

use handover_core::BridgeError;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

type Callback<T> = Box<dyn FnOnce(Result<T, BridgeError>) + Send>;

enum Target<T> {
    Channel(oneshot::Sender<Result<T, BridgeError>>),
    Callback(Callback<T>),
}

/// Receiving half of a call's outcome.
pub struct Completion<T> {
    target: Target<T>,
}

impl<T> Completion<T> {
    /// A completion paired with a future resolving to its outcome.
    pub fn channel() -> (Self, Pending<T>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                target: Target::Channel(tx),
            },
            Pending { rx },
        )
    }

    /// A completion that runs `f` with the outcome.
    pub fn from_fn(f: impl FnOnce(Result<T, BridgeError>) + Send + 'static) -> Self {
        Self {
            target: Target::Callback(Box::new(f)),
        }
    }

    pub fn complete(self, result: Result<T, BridgeError>) {
        match self.target {
            Target::Channel(tx) => {
                // Receiver gone means nobody is waiting any more.
                let _ = tx.send(result);
            }
            Target::Callback(f) => f(result),
        }
    }

    pub fn succeed(self, value: T) {
        self.complete(Ok(value));
    }

    pub fn fail(self, error: BridgeError) {
        self.complete(Err(error));
    }
}

impl<T: Send + 'static> Completion<T> {
    /// Adapt to a completion accepting `U`, converting successes with `f`.
    pub fn adapt<U>(self, f: impl FnOnce(U) -> T + Send + 'static) -> Completion<U> {
        Completion::from_fn(move |result: Result<U, BridgeError>| self.complete(result.map(f)))
    }
}

impl<T> fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.target {
            Target::Channel(_) => "channel",
            Target::Callback(_) => "callback",
        };
        f.debug_struct("Completion").field("target", &kind).finish()
    }
}

/// Future resolving to the outcome delivered through a [`Completion`].
#[derive(Debug)]
pub struct Pending<T> {
    rx: oneshot::Receiver<Result<T, BridgeError>>,
}

impl<T> Future for Pending<T> {
    type Output = Result<T, BridgeError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(BridgeError::Abandoned)))
    }
}
