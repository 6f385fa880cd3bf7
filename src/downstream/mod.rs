//! Downstream service subsystem.
//!
//! # Data Flow
//! ```text
//! ResilientDownstream::invoke(parent snapshot)
//!     → circuit breaker admission (reject → fallback)
//!     → client span (child of the snapshot) → B3 headers
//!     → client.rs (single GET, bounded by the call deadline)
//!     → breaker outcome + span finish
//!     → CallResult (downstream body or fallback)
//! ```

pub mod client;
pub mod error;
pub mod resilient;

pub use client::{OutboundClient, Reply};
pub use error::DownstreamError;
pub use resilient::{CallResult, ResilientDownstream};
