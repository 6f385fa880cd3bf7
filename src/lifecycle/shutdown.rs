//! Shutdown coordination.
//!
//! Shutdown runs in two stages:
//! 1. `trigger` stops the HTTP server from accepting. Requests already in progress finish,
//!    including their chained downstream call or its fallback.
//! 2. Once the event loop has returned, `main` stops the worker pool with a bounded timeout.
//!    Anything still running there is abandoned. Its caller has already answered or gone away.

use tokio::sync::broadcast;

/// Broadcasts the stop request to the HTTP server and any other listener.
///
/// Clones share one channel, so the signal handler can hold its own copy.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Signal every subscriber. Triggering with no subscribers left is not an error.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Number of tasks still listening.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
