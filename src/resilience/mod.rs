//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Downstream call:
//!     → circuit_breaker.rs (admit, or reject fast while open)
//!     → deadline (call_timeout; late results are dropped with the future)
//!     → circuit_breaker.rs (record outcome, open circuit if threshold exceeded)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every downstream call has a deadline
//! - No retries: a failed call degrades to the fallback immediately
//! - Circuit breaker prevents cascading failures

pub mod circuit_breaker;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerRegistry, CircuitState, Permit, Rejected};
