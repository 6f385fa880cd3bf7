//! Server span middleware.
//!
//! Wraps the traced routes: joins or starts a trace for the inbound request, exposes an
//! immutable snapshot of it to handlers through [`ActiveSpan`], and finishes the span with the
//! response status once the handler returns. If the request is cancelled first (request
//! timeout, client gone), dropping the span reports it as an error.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use std::time::Instant;

use crate::observability::metrics;
use crate::observability::trace::{TraceContext, Tracer};

/// Trace position of the request being served. `None` when tracing is disabled.
#[derive(Debug, Clone, Copy)]
pub struct ActiveSpan(pub Option<TraceContext>);

pub async fn server_span(State(tracer): State<Tracer>, mut request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let url = match request.headers().get(header::HOST).and_then(|h| h.to_str().ok()) {
        Some(host) => format!("http://{}{}", host, request.uri()),
        None => request.uri().to_string(),
    };

    let mut span = tracer.extract_or_create(request.headers(), method.as_str(), &url);
    request.extensions_mut().insert(ActiveSpan(span.context()));

    let response = next.run(request).await;

    let status = response.status();
    span.finish(Some(status.as_u16()), status.is_server_error());
    metrics::record_request(method.as_str(), status.as_u16(), start);
    response
}
