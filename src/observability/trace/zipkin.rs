//! Asynchronous Zipkin reporter.
//!
//! Spans are queued on a bounded channel and POSTed in batches as Zipkin v1 JSON to
//! `{collector}/api/v1/spans` by a background task. Reporting never blocks and never fails
//! the caller: a full queue or an unreachable collector drops spans with a log line.
//! Each POST is bounded by `report_timeout`, so a collector that stops answering costs one
//! batch and the next flush tries again.

use axum::body::Body;
use axum::http::{header, Method, Request, Uri};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time;

use super::span::{FinishedSpan, Reporter, SpanKind};
use crate::config::TracingConfig;

#[derive(Debug, Error)]
pub enum ZipkinError {
    #[error("invalid collector URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

pub struct ZipkinReporter {
    queue: mpsc::Sender<FinishedSpan>,
}

impl ZipkinReporter {
    /// Start the flush task and return the reporter feeding it.
    pub fn spawn(collector: &str, config: &TracingConfig) -> Result<Arc<Self>, ZipkinError> {
        let endpoint = spans_endpoint(collector)?;
        let (queue, rx) = mpsc::channel(config.queue_capacity.max(1));

        let flusher = Flusher {
            client: Client::builder(TokioExecutor::new()).build(HttpConnector::new()),
            endpoint,
            service_name: config.service_name.clone(),
            max_batch: config.max_batch.max(1),
            report_timeout: config.report_timeout(),
        };
        let interval = Duration::from_millis(config.flush_interval_ms.max(1));
        tokio::spawn(flusher.run(rx, interval));

        Ok(Arc::new(Self { queue }))
    }
}

impl Reporter for ZipkinReporter {
    fn report(&self, span: FinishedSpan) {
        if let Err(e) = self.queue.try_send(span) {
            tracing::debug!(error = %e, "Dropping span, reporter queue unavailable");
        }
    }
}

fn spans_endpoint(collector: &str) -> Result<Uri, ZipkinError> {
    let invalid = |reason: String| ZipkinError::InvalidUrl {
        url: collector.to_string(),
        reason,
    };
    let joined = format!("{}/api/v1/spans", collector.trim_end_matches('/'));
    let url = url::Url::parse(&joined).map_err(|e| invalid(e.to_string()))?;
    url.as_str()
        .parse::<Uri>()
        .map_err(|e| invalid(e.to_string()))
}

struct Flusher {
    client: Client<HttpConnector, Body>,
    endpoint: Uri,
    service_name: String,
    max_batch: usize,
    report_timeout: Duration,
}

impl Flusher {
    async fn run(self, mut rx: mpsc::Receiver<FinishedSpan>, interval: Duration) {
        let mut ticker = time::interval(interval);
        let mut pending = Vec::with_capacity(self.max_batch);

        loop {
            tokio::select! {
                received = rx.recv() => match received {
                    Some(span) => {
                        pending.push(span);
                        if pending.len() >= self.max_batch {
                            self.flush(&mut pending).await;
                        }
                    }
                    None => {
                        self.flush(&mut pending).await;
                        tracing::debug!("Zipkin reporter closed");
                        return;
                    }
                },
                _ = ticker.tick() => self.flush(&mut pending).await,
            }
        }
    }

    async fn flush(&self, pending: &mut Vec<FinishedSpan>) {
        if pending.is_empty() {
            return;
        }
        let batch = std::mem::take(pending);
        let count = batch.len();

        let payload = match encode(&batch, &self.service_name) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, spans = count, "Failed to encode spans");
                return;
            }
        };
        let request = match Request::builder()
            .method(Method::POST)
            .uri(self.endpoint.clone())
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload))
        {
            Ok(req) => req,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to build span report request");
                return;
            }
        };

        match time::timeout(self.report_timeout, self.client.request(request)).await {
            Ok(Ok(response)) if response.status().is_success() => {
                tracing::trace!(spans = count, "Reported spans");
            }
            Ok(Ok(response)) => {
                tracing::warn!(status = %response.status(), spans = count, "Collector rejected spans");
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, spans = count, "Failed to report spans");
            }
            Err(_) => {
                tracing::warn!(
                    timeout = ?self.report_timeout,
                    spans = count,
                    "Collector did not answer in time, dropping spans"
                );
            }
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct V1Span<'a> {
    trace_id: String,
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent_id: Option<String>,
    name: String,
    timestamp: u64,
    duration: u64,
    annotations: [V1Annotation<'a>; 2],
    binary_annotations: Vec<V1BinaryAnnotation<'a>>,
}

#[derive(Serialize)]
struct V1Annotation<'a> {
    timestamp: u64,
    value: &'static str,
    endpoint: V1Endpoint<'a>,
}

#[derive(Serialize)]
struct V1BinaryAnnotation<'a> {
    key: &'a str,
    value: &'a str,
    endpoint: V1Endpoint<'a>,
}

#[derive(Serialize, Clone, Copy)]
#[serde(rename_all = "camelCase")]
struct V1Endpoint<'a> {
    service_name: &'a str,
}

/// Encode `spans` as a Zipkin v1 JSON array.
pub fn encode(spans: &[FinishedSpan], service_name: &str) -> serde_json::Result<Vec<u8>> {
    let endpoint = V1Endpoint { service_name };
    let encoded: Vec<V1Span<'_>> = spans
        .iter()
        .map(|span| {
            let (start, end) = match span.kind {
                SpanKind::Server => ("sr", "ss"),
                SpanKind::Client => ("cs", "cr"),
            };
            V1Span {
                trace_id: span.context.trace_id.to_string(),
                id: span.context.span_id.to_string(),
                parent_id: span.context.parent_id.map(|p| p.to_string()),
                name: span.name.to_lowercase(),
                timestamp: span.timestamp_micros,
                duration: span.duration_micros,
                annotations: [
                    V1Annotation {
                        timestamp: span.timestamp_micros,
                        value: start,
                        endpoint,
                    },
                    V1Annotation {
                        timestamp: span.timestamp_micros + span.duration_micros,
                        value: end,
                        endpoint,
                    },
                ],
                binary_annotations: span
                    .tags
                    .iter()
                    .map(|(key, value)| V1BinaryAnnotation {
                        key,
                        value,
                        endpoint,
                    })
                    .collect(),
            }
        })
        .collect();
    serde_json::to_vec(&encoded)
}
