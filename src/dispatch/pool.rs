//! Worker runtime for downstream calls.

use std::time::Duration;
use tokio::runtime::{Builder, Handle, Runtime};

use crate::config::DispatcherConfig;

pub const WORKER_THREAD_NAME: &str = "aloha-worker";

/// A multi-threaded Tokio runtime kept apart from the request-accepting event loop.
///
/// Must be created and shut down outside of any async context.
pub struct WorkerPool {
    runtime: Runtime,
}

impl WorkerPool {
    pub fn new(config: &DispatcherConfig) -> std::io::Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(config.worker_threads.max(1))
            .thread_name(WORKER_THREAD_NAME)
            .enable_all()
            .build()?;

        tracing::info!(worker_threads = config.worker_threads, "Worker pool started");
        Ok(Self { runtime })
    }

    pub fn handle(&self) -> Handle {
        self.runtime.handle().clone()
    }

    /// Stop the workers, abandoning calls still running after `timeout`.
    pub fn shutdown(self, timeout: Duration) {
        self.runtime.shutdown_timeout(timeout);
        tracing::info!("Worker pool stopped");
    }
}
