//! Offloading of downstream calls to the worker runtime.
//!
//! # Responsibilities
//! - Run a call on the worker runtime, away from the event loop
//! - Bound the number of calls running at once
//! - Resume the caller exactly once with the call's output
//!
//! # Design Decisions
//! - The result comes back over a oneshot channel and is awaited in the request's own task,
//!   so completion handling for one request is never concurrent with itself
//! - A caller that went away causes the result to be discarded, never delivered elsewhere
//! - A worker that dies resolves the caller with `DispatchError`, never leaves it hanging
//! - Waiting for a free slot can be time-boxed, so a saturated pool fails fast instead of
//!   adding unbounded queueing to the call's own deadline

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::{oneshot, Semaphore};

use crate::observability::metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("dispatched call was abandoned by the worker")]
    Abandoned,

    #[error("no worker slot became free within {0:?}")]
    QueueTimeout(Duration),
}

impl DispatchError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::Abandoned => "abandoned",
            DispatchError::QueueTimeout(_) => "queue_timeout",
        }
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    handle: Handle,
    permits: Arc<Semaphore>,
    in_flight: Arc<AtomicUsize>,
    queue_timeout: Option<Duration>,
}

impl Dispatcher {
    /// Dispatch onto the runtime behind `handle`, at most `max_in_flight` calls at once.
    pub fn new(handle: Handle, max_in_flight: usize) -> Self {
        Self {
            handle,
            permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
            in_flight: Arc::new(AtomicUsize::new(0)),
            queue_timeout: None,
        }
    }

    /// Give up on dispatches that wait longer than `limit` for a free slot.
    /// Without it, dispatches queue until a slot frees up.
    pub fn with_queue_timeout(mut self, limit: Duration) -> Self {
        self.queue_timeout = Some(limit);
        self
    }

    /// Dispatch onto the runtime the caller is running in.
    ///
    /// # Panics
    /// Panics when called outside of a Tokio runtime.
    pub fn current(max_in_flight: usize) -> Self {
        Self::new(Handle::current(), max_in_flight)
    }

    /// Calls currently running on workers.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Schedule `work` on the worker runtime.
    ///
    /// The returned future resolves once, with the output of `work`, or with
    /// [`DispatchError::QueueTimeout`] if no slot freed up in time.
    pub fn dispatch<F>(&self, work: F) -> Dispatched<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let permits = self.permits.clone();
        let in_flight = self.in_flight.clone();
        let queue_timeout = self.queue_timeout;

        self.handle.spawn(async move {
            let acquired = match queue_timeout {
                Some(limit) => match tokio::time::timeout(limit, permits.acquire_owned()).await {
                    Ok(acquired) => acquired,
                    Err(_) => {
                        tracing::warn!(waited = ?limit, "No worker slot free, giving up on dispatch");
                        let _ = tx.send(Err(DispatchError::QueueTimeout(limit)));
                        return;
                    }
                },
                None => permits.acquire_owned().await,
            };
            let Ok(_permit) = acquired else {
                return;
            };
            if tx.is_closed() {
                tracing::debug!("Caller gone before dispatch started, skipping call");
                return;
            }

            let running = InFlight::enter(in_flight);
            let output = work.await;
            drop(running);

            if tx.send(Ok(output)).is_err() {
                tracing::debug!("Caller gone before dispatch completed, discarding result");
            }
        });

        Dispatched { rx }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("available_permits", &self.permits.available_permits())
            .field("in_flight", &self.in_flight())
            .field("queue_timeout", &self.queue_timeout)
            .finish()
    }
}

/// Pending result of [`Dispatcher::dispatch`].
#[must_use = "dropping a Dispatched discards the call's result"]
pub struct Dispatched<T> {
    rx: oneshot::Receiver<Result<T, DispatchError>>,
}

impl<T> Unpin for Dispatched<T> {}

impl<T> Future for Dispatched<T> {
    type Output = Result<T, DispatchError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(DispatchError::Abandoned)))
    }
}

/// Keeps the in-flight gauge honest even if the work panics.
struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(counter: Arc<AtomicUsize>) -> Self {
        let now = counter.fetch_add(1, Ordering::Relaxed) + 1;
        metrics::record_dispatch_in_flight(now);
        Self(counter)
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        let now = self.0.fetch_sub(1, Ordering::Relaxed) - 1;
        metrics::record_dispatch_in_flight(now);
    }
}
