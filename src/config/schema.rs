//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the aloha service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AlohaConfig {
    /// Local greeting settings.
    pub greeting: GreetingConfig,

    /// Listener configuration (bind address, body limit).
    pub listener: ListenerConfig,

    /// Timeout configuration for inbound requests.
    pub timeouts: TimeoutConfig,

    /// The single downstream service the chaining endpoint calls.
    pub downstream: DownstreamConfig,

    /// Failure isolation policy for downstream calls.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Worker pool used to offload downstream calls.
    pub dispatcher: DispatcherConfig,

    /// Distributed tracing (Zipkin) settings.
    pub tracing: TracingConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GreetingConfig {
    /// Suffix of the local greeting, usually the pod hostname.
    pub hostname: String,
}

impl Default for GreetingConfig {
    fn default() -> Self {
        Self {
            hostname: "unknown".to_string(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum accepted request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_bytes: 64 * 1024,
        }
    }
}

/// Timeout configuration for inbound requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Downstream service definition.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DownstreamConfig {
    /// Target name, used as the circuit breaker key and in logs/metrics.
    pub name: String,

    /// Host name or IP of the downstream service.
    pub host: String,

    /// Port of the downstream service.
    pub port: u16,

    /// Path requested on the downstream service.
    pub path: String,

    /// Body returned in place of the downstream result when the call cannot complete.
    pub fallback: String,
}

impl DownstreamConfig {
    /// Base URL of the downstream service, e.g. `http://bonjour:8080/`.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}{}", self.host, self.port, self.path)
    }
}

impl Default for DownstreamConfig {
    fn default() -> Self {
        Self {
            name: "bonjour".to_string(),
            host: "bonjour".to_string(),
            port: 8080,
            path: "/".to_string(),
            fallback: "Bonjour response (fallback)".to_string(),
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,

    /// Failures further apart than this window do not accumulate, in milliseconds.
    pub failure_window_ms: u64,

    /// How long the circuit stays open before admitting trial calls, in milliseconds.
    pub open_duration_ms: u64,

    /// Per-call deadline, in milliseconds. Exceeding it counts as a failure.
    pub call_timeout_ms: u64,

    /// Trial calls allowed in flight while half-open.
    pub half_open_max_calls: u32,
}

impl CircuitBreakerConfig {
    pub fn failure_window(&self) -> Duration {
        Duration::from_millis(self.failure_window_ms)
    }

    pub fn open_duration(&self) -> Duration {
        Duration::from_millis(self.open_duration_ms)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            failure_window_ms: 10_000,
            open_duration_ms: 5_000,
            call_timeout_ms: 1_000,
            half_open_max_calls: 1,
        }
    }
}

/// Worker pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Threads in the worker runtime.
    pub worker_threads: usize,

    /// Maximum downstream calls running at once; further dispatches queue.
    pub max_in_flight: usize,

    /// Longest a dispatch may wait in that queue before it gives up, in milliseconds.
    /// The wait comes on top of `circuit_breaker.call_timeout_ms`.
    pub queue_timeout_ms: u64,
}

impl DispatcherConfig {
    pub fn queue_timeout(&self) -> Duration {
        Duration::from_millis(self.queue_timeout_ms)
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            worker_threads: 4,
            max_in_flight: 20,
            queue_timeout_ms: 1_000,
        }
    }
}

/// Distributed tracing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TracingConfig {
    /// Zipkin collector base URL. Tracing is a no-op when absent.
    pub zipkin_server_url: Option<String>,

    /// Local service name reported on every span.
    pub service_name: String,

    /// Interval between reporter flushes in milliseconds.
    pub flush_interval_ms: u64,

    /// Maximum spans per POST to the collector.
    pub max_batch: usize,

    /// Spans buffered before new ones are dropped.
    pub queue_capacity: usize,

    /// Deadline for one POST to the collector in milliseconds. The batch is dropped on expiry.
    pub report_timeout_ms: u64,
}

impl TracingConfig {
    pub fn report_timeout(&self) -> Duration {
        Duration::from_millis(self.report_timeout_ms)
    }
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            zipkin_server_url: None,
            service_name: "aloha".to_string(),
            flush_interval_ms: 1_000,
            max_batch: 100,
            queue_capacity: 1_024,
            report_timeout_ms: 5_000,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AlohaConfig::default();
        assert_eq!(config.greeting.hostname, "unknown");
        assert_eq!(config.downstream.base_url(), "http://bonjour:8080/");
        assert_eq!(config.downstream.fallback, "Bonjour response (fallback)");
        assert!(config.tracing.zipkin_server_url.is_none());
        assert_eq!(config.circuit_breaker.call_timeout(), Duration::from_secs(1));
        assert_eq!(config.dispatcher.queue_timeout(), Duration::from_secs(1));
        assert_eq!(config.tracing.report_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: AlohaConfig = toml::from_str(
            r#"
            [downstream]
            host = "127.0.0.1"
            port = 9000

            [observability]
            log_format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.downstream.base_url(), "http://127.0.0.1:9000/");
        assert_eq!(config.downstream.name, "bonjour");
        assert_eq!(config.observability.log_format, LogFormat::Json);
        assert_eq!(config.circuit_breaker.failure_threshold, 5);
    }
}
