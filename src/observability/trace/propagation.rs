//! B3 header propagation (Zipkin wire format).
//!
//! Extraction accepts both the multi-header form (`X-B3-TraceId`, `X-B3-SpanId`, ...) and
//! the single `b3` header. Injection always writes the multi-header form.

use axum::http::{HeaderMap, HeaderName, HeaderValue};

use super::context::{SpanId, TraceContext, TraceId};

pub const TRACE_ID: HeaderName = HeaderName::from_static("x-b3-traceid");
pub const SPAN_ID: HeaderName = HeaderName::from_static("x-b3-spanid");
pub const PARENT_SPAN_ID: HeaderName = HeaderName::from_static("x-b3-parentspanid");
pub const SAMPLED: HeaderName = HeaderName::from_static("x-b3-sampled");
pub const FLAGS: HeaderName = HeaderName::from_static("x-b3-flags");
pub const SINGLE: HeaderName = HeaderName::from_static("b3");

/// Read the caller's span from `headers`. `None` when absent or malformed.
pub fn extract(headers: &HeaderMap) -> Option<TraceContext> {
    extract_multi(headers).or_else(|| extract_single(headers))
}

/// Write `ctx` as B3 headers.
pub fn inject(ctx: &TraceContext, headers: &mut HeaderMap) {
    insert(headers, TRACE_ID, &ctx.trace_id.to_string());
    insert(headers, SPAN_ID, &ctx.span_id.to_string());
    if let Some(parent) = ctx.parent_id {
        insert(headers, PARENT_SPAN_ID, &parent.to_string());
    }
    if let Some(sampled) = ctx.sampled {
        insert(headers, SAMPLED, if sampled { "1" } else { "0" });
    }
}

fn insert(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(name, value);
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
}

fn extract_multi(headers: &HeaderMap) -> Option<TraceContext> {
    let trace_id = TraceId::from_hex(header(headers, &TRACE_ID)?)?;
    let span_id = SpanId::from_hex(header(headers, &SPAN_ID)?)?;
    let parent_id = match header(headers, &PARENT_SPAN_ID) {
        Some(raw) => Some(SpanId::from_hex(raw)?),
        None => None,
    };
    // Debug flag implies sampling.
    let sampled = if header(headers, &FLAGS) == Some("1") {
        Some(true)
    } else {
        header(headers, &SAMPLED).and_then(parse_sampled)
    };

    Some(TraceContext {
        trace_id,
        span_id,
        parent_id,
        sampled,
    })
}

fn extract_single(headers: &HeaderMap) -> Option<TraceContext> {
    let raw = header(headers, &SINGLE)?;
    let mut fields = raw.split('-');
    let trace_id = TraceId::from_hex(fields.next()?)?;
    let span_id = SpanId::from_hex(fields.next()?)?;
    let sampled = match fields.next() {
        Some("d") => Some(true),
        Some(flag) => Some(parse_sampled(flag)?),
        None => None,
    };
    let parent_id = match fields.next() {
        Some(raw) => Some(SpanId::from_hex(raw)?),
        None => None,
    };
    if fields.next().is_some() {
        return None;
    }

    Some(TraceContext {
        trace_id,
        span_id,
        parent_id,
        sampled,
    })
}

fn parse_sampled(raw: &str) -> Option<bool> {
    match raw {
        "1" | "true" => Some(true),
        "0" | "false" => Some(false),
        _ => None,
    }
}
