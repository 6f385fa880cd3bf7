//! Async dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! request task (event loop)
//!     → dispatcher.rs (spawn onto worker runtime, bounded by semaphore)
//!     → pool.rs worker thread runs the downstream call
//!     → oneshot back to the request task, awaited exactly once
//! ```

pub mod dispatcher;
pub mod pool;

pub use dispatcher::{DispatchError, Dispatched, Dispatcher};
pub use pool::WorkerPool;
