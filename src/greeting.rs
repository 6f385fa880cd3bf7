//! Greeting composition.
//!
//! `local` is this instance's own greeting. `chain` combines it with the downstream
//! service's greeting, which is fetched on the worker runtime and never fails from the
//! caller's point of view.

use serde::Serialize;
use std::sync::Arc;

use crate::dispatch::Dispatcher;
use crate::downstream::{CallResult, ResilientDownstream};
use crate::observability::metrics;
use crate::observability::trace::TraceContext;

/// Two greetings in call order, serialized as a JSON array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CombinedGreeting(pub String, pub String);

impl CombinedGreeting {
    pub fn local(&self) -> &str {
        &self.0
    }

    pub fn downstream(&self) -> &str {
        &self.1
    }
}

#[derive(Debug, Clone)]
pub struct GreetingService {
    hostname: String,
    dispatcher: Dispatcher,
    downstream: Arc<ResilientDownstream>,
}

impl GreetingService {
    pub fn new(
        hostname: impl Into<String>,
        dispatcher: Dispatcher,
        downstream: Arc<ResilientDownstream>,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            dispatcher,
            downstream,
        }
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn local(&self) -> String {
        format!("Aloha mai {}", self.hostname)
    }

    /// Greet locally, then ask the downstream service on behalf of `parent`.
    pub async fn chain(&self, parent: Option<TraceContext>) -> CombinedGreeting {
        let local = self.local();

        let downstream = self.downstream.clone();
        let result = match self
            .dispatcher
            .dispatch(async move { downstream.invoke(parent).await })
            .await
        {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(error = %e, downstream = %self.downstream.target(), "Dispatch failed, using fallback");
                metrics::record_fallback(self.downstream.target(), e.kind());
                self.downstream.fallback()
            }
        };

        if let CallResult::Fallback(_) = &result {
            tracing::debug!(downstream = %self.downstream.target(), "Chained greeting degraded");
        }
        CombinedGreeting(local, result.into_inner())
    }
}
