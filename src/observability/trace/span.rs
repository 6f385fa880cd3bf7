//! Spans and the reporter seam.

use axum::http::HeaderMap;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use super::context::TraceContext;
use super::propagation;

pub const TAG_HTTP_METHOD: &str = "http.method";
pub const TAG_HTTP_URL: &str = "http.url";
pub const TAG_HTTP_STATUS: &str = "http.status_code";
pub const TAG_ERROR: &str = "error";

/// Destination for finished spans.
///
/// Implementations must not block: `report` is called from request and worker tasks.
pub trait Reporter: Send + Sync + 'static {
    fn report(&self, span: FinishedSpan);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanKind {
    Server,
    Client,
}

/// A sealed span as handed to a [`Reporter`].
#[derive(Debug, Clone)]
pub struct FinishedSpan {
    pub context: TraceContext,
    pub name: String,
    pub kind: SpanKind,
    /// Start time, microseconds since the Unix epoch.
    pub timestamp_micros: u64,
    pub duration_micros: u64,
    pub tags: Vec<(String, String)>,
}

impl FinishedSpan {
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// A span owned by the flow that started it.
///
/// Spans from a disabled tracer hold nothing and every operation on them is a no-op.
pub struct Span {
    recording: Option<Recording>,
}

struct Recording {
    context: TraceContext,
    name: String,
    kind: SpanKind,
    wall_start: SystemTime,
    start: Instant,
    tags: Vec<(String, String)>,
    reporter: Arc<dyn Reporter>,
    finished: bool,
}

impl Span {
    pub(crate) fn noop() -> Self {
        Self { recording: None }
    }

    pub(crate) fn start(
        context: TraceContext,
        name: impl Into<String>,
        kind: SpanKind,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            recording: Some(Recording {
                context,
                name: name.into(),
                kind,
                wall_start: SystemTime::now(),
                start: Instant::now(),
                tags: Vec::new(),
                reporter,
                finished: false,
            }),
        }
    }

    /// Immutable snapshot of this span's identity, if it is recording.
    pub fn context(&self) -> Option<TraceContext> {
        self.recording.as_ref().map(|r| r.context)
    }

    pub fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    pub fn is_finished(&self) -> bool {
        self.recording.as_ref().is_some_and(|r| r.finished)
    }

    /// Add or replace a tag. Ignored once the span is finished.
    pub fn set_tag(&mut self, key: &str, value: impl Into<String>) {
        let Some(recording) = self.recording.as_mut().filter(|r| !r.finished) else {
            return;
        };
        let value = value.into();
        match recording.tags.iter_mut().find(|(k, _)| k == key) {
            Some(tag) => tag.1 = value,
            None => recording.tags.push((key.to_string(), value)),
        }
    }

    /// B3 headers that make a remote span a child of this one's trace position.
    pub fn outbound_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(ctx) = self.context() {
            propagation::inject(&ctx, &mut headers);
        }
        headers
    }

    /// Seal the span with the call outcome and report it. Only the first call has effect.
    pub fn finish(&mut self, status: Option<u16>, error: bool) {
        if let Some(status) = status {
            self.set_tag(TAG_HTTP_STATUS, status.to_string());
        }
        if error {
            self.set_tag(TAG_ERROR, "true");
        }

        let Some(recording) = self.recording.as_mut() else {
            return;
        };
        if recording.finished {
            return;
        }
        recording.finished = true;

        if !recording.context.is_sampled() {
            return;
        }
        let timestamp_micros = recording
            .wall_start
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or_default();
        recording.reporter.report(FinishedSpan {
            context: recording.context,
            name: recording.name.clone(),
            kind: recording.kind,
            timestamp_micros,
            duration_micros: recording.start.elapsed().as_micros().max(1) as u64,
            tags: std::mem::take(&mut recording.tags),
        });
    }
}

/// A span dropped before `finish`, e.g. because its request was cancelled, is reported as an
/// error without a status code.
impl Drop for Span {
    fn drop(&mut self) {
        if self.is_recording() && !self.is_finished() {
            self.finish(None, true);
        }
    }
}

impl std::fmt::Debug for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.recording {
            Some(r) => f
                .debug_struct("Span")
                .field("context", &r.context)
                .field("name", &r.name)
                .field("kind", &r.kind)
                .field("finished", &r.finished)
                .finish(),
            None => f.write_str("Span(noop)"),
        }
    }
}
