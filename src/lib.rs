//! Aloha greeting service library.
//!
//! Answers a greeting directly or by chaining to one downstream service. The downstream call
//! is offloaded to a worker runtime, guarded by a circuit breaker with a fixed fallback, and
//! carries the inbound request's B3 trace context.

// Core subsystems
pub mod config;
pub mod greeting;
pub mod http;

// Downstream calls
pub mod dispatch;
pub mod downstream;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::schema::AlohaConfig;
pub use greeting::{CombinedGreeting, GreetingService};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
