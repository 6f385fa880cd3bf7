//! Tracer selection and span creation.

use axum::http::HeaderMap;
use std::sync::Arc;

use super::context::TraceContext;
use super::propagation;
use super::span::{Reporter, Span, SpanKind, TAG_HTTP_METHOD, TAG_HTTP_URL};
use super::zipkin::ZipkinReporter;
use crate::config::TracingConfig;

/// Tracing capability, chosen once at startup.
///
/// `Noop` is used when no collector is configured; its spans carry no state and cost nothing.
#[derive(Clone)]
pub enum Tracer {
    Active(Arc<dyn Reporter>),
    Noop,
}

impl Tracer {
    /// Build the tracer described by `config`.
    ///
    /// Must be called from within a Tokio runtime: the Zipkin reporter spawns its flush task.
    /// A collector URL that cannot be used degrades to `Noop` with a warning.
    pub fn from_config(config: &TracingConfig) -> Self {
        let Some(url) = config.zipkin_server_url.as_deref() else {
            tracing::info!("No Zipkin collector configured, tracing disabled");
            return Tracer::Noop;
        };

        match ZipkinReporter::spawn(url, config) {
            Ok(reporter) => {
                tracing::info!(collector = %url, service = %config.service_name, "Using Zipkin tracer");
                Tracer::Active(reporter)
            }
            Err(e) => {
                tracing::warn!(collector = %url, error = %e, "Zipkin reporter unavailable, tracing disabled");
                Tracer::Noop
            }
        }
    }

    pub fn active(reporter: Arc<dyn Reporter>) -> Self {
        Tracer::Active(reporter)
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Tracer::Active(_))
    }

    /// Start the server span for an inbound request.
    ///
    /// Joins the caller's trace when valid B3 headers are present, otherwise starts a new root.
    pub fn extract_or_create(&self, headers: &HeaderMap, method: &str, url: &str) -> Span {
        let Tracer::Active(reporter) = self else {
            return Span::noop();
        };

        let context = match propagation::extract(headers) {
            Some(caller) => caller.child(),
            None => TraceContext::new_root(),
        };
        let mut span = Span::start(context, method, SpanKind::Server, reporter.clone());
        span.set_tag(TAG_HTTP_METHOD, method);
        span.set_tag(TAG_HTTP_URL, url);
        span
    }

    /// Start a client span for an outbound call made on behalf of `parent`.
    pub fn start_client_span(
        &self,
        parent: Option<&TraceContext>,
        method: &str,
        url: &str,
    ) -> Span {
        let Tracer::Active(reporter) = self else {
            return Span::noop();
        };

        let context = match parent {
            Some(parent) => parent.child(),
            None => TraceContext::new_root(),
        };
        let mut span = Span::start(context, method, SpanKind::Client, reporter.clone());
        span.set_tag(TAG_HTTP_METHOD, method);
        span.set_tag(TAG_HTTP_URL, url);
        span
    }
}

impl std::fmt::Debug for Tracer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tracer::Active(_) => f.write_str("Tracer::Active"),
            Tracer::Noop => f.write_str("Tracer::Noop"),
        }
    }
}
