//! Downstream call wrapped with circuit breaking, a deadline and a static fallback.

use std::sync::Arc;
use std::time::Instant;

use crate::downstream::client::OutboundClient;
use crate::downstream::error::DownstreamError;
use crate::observability::metrics;
use crate::observability::trace::{TraceContext, Tracer};
use crate::resilience::CircuitBreaker;

/// Outcome of one downstream invocation. Never an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallResult {
    /// Body returned by the downstream service.
    Success(String),
    /// The configured fallback, used because the call was rejected or failed.
    Fallback(String),
}

impl CallResult {
    pub fn is_fallback(&self) -> bool {
        matches!(self, CallResult::Fallback(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            CallResult::Success(body) | CallResult::Fallback(body) => body,
        }
    }

    pub fn into_inner(self) -> String {
        match self {
            CallResult::Success(body) | CallResult::Fallback(body) => body,
        }
    }
}

/// The downstream client for one target together with its breaker and fallback.
///
/// Built once at startup and shared by every dispatched call.
#[derive(Debug)]
pub struct ResilientDownstream {
    client: OutboundClient,
    breaker: Arc<CircuitBreaker>,
    tracer: Tracer,
    fallback: String,
}

impl ResilientDownstream {
    pub fn new(
        client: OutboundClient,
        breaker: Arc<CircuitBreaker>,
        tracer: Tracer,
        fallback: impl Into<String>,
    ) -> Self {
        Self {
            client,
            breaker,
            tracer,
            fallback: fallback.into(),
        }
    }

    pub fn target(&self) -> &str {
        self.client.target()
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn fallback(&self) -> CallResult {
        CallResult::Fallback(self.fallback.clone())
    }

    /// Call the downstream service on behalf of the request identified by `parent`.
    ///
    /// Rejections, non-2xx replies, connection failures and timeouts all yield the fallback.
    /// A call that exceeds the deadline is dropped, so a late response is never observed.
    pub async fn invoke(&self, parent: Option<TraceContext>) -> CallResult {
        let target = self.target();

        let permit = match self.breaker.try_acquire() {
            Ok(permit) => permit,
            Err(rejected) => {
                tracing::warn!(downstream = %target, reason = %rejected, "Short-circuiting to fallback");
                metrics::record_fallback(target, "rejected");
                return self.fallback();
            }
        };

        let start = Instant::now();
        let mut span = self
            .tracer
            .start_client_span(parent.as_ref(), "GET", self.client.url());
        let deadline = self.breaker.call_timeout();

        let outcome = match tokio::time::timeout(deadline, self.client.get(span.outbound_headers())).await {
            Ok(outcome) => outcome,
            Err(_) => Err(DownstreamError::Timeout(deadline)),
        };

        match outcome {
            Ok(reply) => {
                permit.success();
                span.finish(Some(reply.status.as_u16()), false);
                metrics::record_downstream_call(target, "success", start);
                CallResult::Success(reply.body)
            }
            Err(e) => {
                permit.failure();
                span.finish(e.status().map(|s| s.as_u16()), true);
                tracing::warn!(
                    downstream = %target,
                    error = %e,
                    circuit = ?self.breaker.state(),
                    "Downstream call failed, using fallback"
                );
                metrics::record_downstream_call(target, e.kind(), start);
                metrics::record_fallback(target, e.kind());
                self.fallback()
            }
        }
    }
}
