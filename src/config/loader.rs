//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

use crate::config::schema::AlohaConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {value:?}")]
    Env { key: &'static str, value: String },

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse a TOML file without validating it.
pub fn read_config(path: &Path) -> Result<AlohaConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<AlohaConfig, ConfigError> {
    let config = read_config(path)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Build the effective configuration: optional file, then process environment, then validation.
pub fn load(path: Option<&Path>) -> Result<AlohaConfig, ConfigError> {
    let mut config = match path {
        Some(path) => read_config(path)?,
        None => AlohaConfig::default(),
    };
    apply_env(&mut config, |key| std::env::var(key).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Overlay environment-style settings onto `config`.
///
/// `lookup` abstracts the environment so callers can supply their own source.
pub fn apply_env<F>(config: &mut AlohaConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(hostname) = lookup("HOSTNAME") {
        config.greeting.hostname = hostname;
    }
    if let Some(bind) = lookup("ALOHA_BIND_ADDRESS") {
        config.listener.bind_address = bind;
    }
    if let Some(host) = lookup("DOWNSTREAM_HOST") {
        config.downstream.host = host;
    }
    if let Some(port) = parsed(&lookup, "DOWNSTREAM_PORT")? {
        config.downstream.port = port;
    }
    if let Some(url) = lookup("ZIPKIN_SERVER_URL") {
        config.tracing.zipkin_server_url = Some(url);
    }
    if let Some(threshold) = parsed(&lookup, "CIRCUIT_FAILURE_THRESHOLD")? {
        config.circuit_breaker.failure_threshold = threshold;
    }
    if let Some(ms) = parsed(&lookup, "CIRCUIT_OPEN_DURATION_MS")? {
        config.circuit_breaker.open_duration_ms = ms;
    }
    if let Some(ms) = parsed(&lookup, "CIRCUIT_CALL_TIMEOUT_MS")? {
        config.circuit_breaker.call_timeout_ms = ms;
    }
    Ok(())
}

fn parsed<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Env { key, value }),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AlohaConfig::default();
        apply_env(
            &mut config,
            env(&[
                ("HOSTNAME", "worker1"),
                ("DOWNSTREAM_HOST", "127.0.0.1"),
                ("DOWNSTREAM_PORT", "9001"),
                ("ZIPKIN_SERVER_URL", "http://zipkin:9411"),
                ("CIRCUIT_FAILURE_THRESHOLD", "3"),
            ]),
        )
        .unwrap();

        assert_eq!(config.greeting.hostname, "worker1");
        assert_eq!(config.downstream.base_url(), "http://127.0.0.1:9001/");
        assert_eq!(config.tracing.zipkin_server_url.as_deref(), Some("http://zipkin:9411"));
        assert_eq!(config.circuit_breaker.failure_threshold, 3);
    }

    #[test]
    fn test_env_absent_keeps_defaults() {
        let mut config = AlohaConfig::default();
        apply_env(&mut config, env(&[])).unwrap();
        assert_eq!(config.greeting.hostname, "unknown");
        assert!(config.tracing.zipkin_server_url.is_none());
    }

    #[test]
    fn test_env_rejects_garbage() {
        let mut config = AlohaConfig::default();
        let err = apply_env(&mut config, env(&[("DOWNSTREAM_PORT", "eighty")])).unwrap_err();
        assert_eq!(err.to_string(), "Invalid value for DOWNSTREAM_PORT: \"eighty\"");
    }

    #[test]
    fn test_load_config_from_file() {
        let path = std::env::temp_dir().join(format!("aloha-config-{}.toml", std::process::id()));
        fs::write(&path, "[greeting]\nhostname = \"from-file\"\n").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.greeting.hostname, "from-file");

        fs::remove_file(&path).unwrap_or_default();
    }

    #[test]
    fn test_load_config_reports_validation() {
        let path = std::env::temp_dir().join(format!("aloha-invalid-{}.toml", std::process::id()));
        fs::write(&path, "[circuit_breaker]\ncall_timeout_ms = 0\n").unwrap();

        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("circuit_breaker.call_timeout_ms"));

        fs::remove_file(&path).unwrap_or_default();
    }
}
