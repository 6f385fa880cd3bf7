//! Outbound HTTP client for the downstream service.
//!
//! # Responsibilities
//! - Issue exactly one GET per call to the configured base URL
//! - Attach the trace headers handed in by the caller
//! - Map non-2xx, connection and body failures to `DownstreamError`
//!
//! # Design Decisions
//! - One pooled client per target, built at startup
//! - No timeout here: the circuit breaker layer owns the deadline

use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode, Uri};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::downstream::error::DownstreamError;

/// Largest downstream body we are willing to buffer.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// A successful downstream response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: StatusCode,
    pub body: String,
}

pub struct OutboundClient {
    target: String,
    url: String,
    uri: Uri,
    client: Client<HttpConnector, Body>,
}

impl OutboundClient {
    pub fn new(target: impl Into<String>, base_url: &str) -> Result<Self, DownstreamError> {
        let uri: Uri = base_url
            .parse()
            .map_err(|e| DownstreamError::InvalidRequest(format!("{base_url}: {e}")))?;
        if uri.scheme().is_none() || uri.authority().is_none() {
            return Err(DownstreamError::InvalidRequest(format!(
                "{base_url}: absolute http URL required"
            )));
        }

        Ok(Self {
            target: target.into(),
            url: base_url.to_string(),
            uri,
            client: Client::builder(TokioExecutor::new()).build(HttpConnector::new()),
        })
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// GET the base URL with `trace_headers` attached and return the body on 2xx.
    pub async fn get(&self, trace_headers: HeaderMap) -> Result<Reply, DownstreamError> {
        let mut request = Request::builder()
            .method(Method::GET)
            .uri(self.uri.clone())
            .header(header::USER_AGENT, "aloha")
            .header(header::ACCEPT, "text/plain")
            .body(Body::empty())
            .map_err(|e| DownstreamError::InvalidRequest(e.to_string()))?;
        request.headers_mut().extend(trace_headers);

        tracing::debug!(downstream = %self.target, url = %self.url, "Calling downstream");

        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| DownstreamError::Connect(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownstreamError::Status(status));
        }

        let bytes = axum::body::to_bytes(Body::new(response.into_body()), MAX_BODY_BYTES)
            .await
            .map_err(|e| DownstreamError::Body(e.to_string()))?;

        Ok(Reply {
            status,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }
}

impl std::fmt::Debug for OutboundClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutboundClient")
            .field("target", &self.target)
            .field("url", &self.url)
            .finish()
    }
}
