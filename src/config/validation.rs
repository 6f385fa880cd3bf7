//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ports valid)
//! - Check addresses and URLs parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AlohaConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::AlohaConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field} is not a valid socket address: {value}")]
    Address { field: &'static str, value: String },

    #[error("{field} is not a valid URL: {value}")]
    Url { field: &'static str, value: String },
}

pub fn validate_config(config: &AlohaConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::Address {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::Zero { field: "timeouts.request_secs" });
    }

    let downstream = &config.downstream;
    if downstream.name.is_empty() {
        errors.push(ValidationError::Empty { field: "downstream.name" });
    }
    if downstream.host.is_empty() {
        errors.push(ValidationError::Empty { field: "downstream.host" });
    }
    if downstream.port == 0 {
        errors.push(ValidationError::Zero { field: "downstream.port" });
    }
    if !downstream.path.starts_with('/') || url::Url::parse(&downstream.base_url()).is_err() {
        errors.push(ValidationError::Url {
            field: "downstream",
            value: downstream.base_url(),
        });
    }

    let breaker = &config.circuit_breaker;
    if breaker.failure_threshold == 0 {
        errors.push(ValidationError::Zero { field: "circuit_breaker.failure_threshold" });
    }
    if breaker.call_timeout_ms == 0 {
        errors.push(ValidationError::Zero { field: "circuit_breaker.call_timeout_ms" });
    }
    if breaker.open_duration_ms == 0 {
        errors.push(ValidationError::Zero { field: "circuit_breaker.open_duration_ms" });
    }
    if breaker.half_open_max_calls == 0 {
        errors.push(ValidationError::Zero { field: "circuit_breaker.half_open_max_calls" });
    }

    if config.dispatcher.worker_threads == 0 {
        errors.push(ValidationError::Zero { field: "dispatcher.worker_threads" });
    }
    if config.dispatcher.max_in_flight == 0 {
        errors.push(ValidationError::Zero { field: "dispatcher.max_in_flight" });
    }
    if config.dispatcher.queue_timeout_ms == 0 {
        errors.push(ValidationError::Zero { field: "dispatcher.queue_timeout_ms" });
    }

    if let Some(zipkin) = &config.tracing.zipkin_server_url {
        if url::Url::parse(zipkin).is_err() {
            errors.push(ValidationError::Url {
                field: "tracing.zipkin_server_url",
                value: zipkin.clone(),
            });
        }
    }
    if config.tracing.queue_capacity == 0 {
        errors.push(ValidationError::Zero { field: "tracing.queue_capacity" });
    }
    if config.tracing.report_timeout_ms == 0 {
        errors.push(ValidationError::Zero { field: "tracing.report_timeout_ms" });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::Address {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&AlohaConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = AlohaConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.circuit_breaker.failure_threshold = 0;
        config.downstream.port = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&ValidationError::Zero {
            field: "circuit_breaker.failure_threshold"
        }));
    }

    #[test]
    fn test_rejects_bad_zipkin_url() {
        let mut config = AlohaConfig::default();
        config.tracing.zipkin_server_url = Some("zipkin without scheme".into());

        let errors = validate_config(&config).unwrap_err();
        assert!(errors[0].to_string().contains("tracing.zipkin_server_url"));
    }

    #[test]
    fn test_rejects_zero_timeouts() {
        let mut config = AlohaConfig::default();
        config.dispatcher.queue_timeout_ms = 0;
        config.tracing.report_timeout_ms = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::Zero { field: "dispatcher.queue_timeout_ms" },
                ValidationError::Zero { field: "tracing.report_timeout_ms" },
            ]
        );
    }
}
