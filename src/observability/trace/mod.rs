//! Distributed tracing support.
//!
//! # Responsibilities
//! - Extract trace context from incoming requests (B3 headers)
//! - Propagate trace context to the downstream request
//! - Create and report server and client spans
//!
//! # Data Flow
//! ```text
//! inbound headers
//!     → tracer.rs (extract_or_create: server span)
//!     → TraceContext snapshot (Copy) crosses the dispatch boundary
//!     → tracer.rs (start_client_span: child of the snapshot)
//!     → propagation.rs (inject B3 headers on the outbound request)
//!     → span.rs (finish, once)
//!     → zipkin.rs (batched POST to the collector)
//! ```
//!
//! # Design Decisions
//! - No ambient "current span": the snapshot is passed explicitly
//! - Optional: without a collector URL the tracer is a no-op
//! - Reporting is fire-and-forget; tracing failures never reach requests

pub mod context;
pub mod propagation;
pub mod span;
pub mod tracer;
pub mod zipkin;

pub use context::{SpanId, TraceContext, TraceId};
pub use span::{FinishedSpan, Reporter, Span, SpanKind};
pub use tracer::Tracer;
pub use zipkin::ZipkinReporter;
