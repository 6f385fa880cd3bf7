//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → loader.rs (environment overrides: HOSTNAME, ZIPKIN_SERVER_URL, ...)
//!     → validation.rs (semantic checks)
//!     → AlohaConfig (validated, immutable)
//!     → handed to subsystems at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults, so the service starts with no file and no environment
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load, ConfigError};
pub use schema::{
    AlohaConfig, CircuitBreakerConfig, DispatcherConfig, DownstreamConfig, GreetingConfig,
    ListenerConfig, LogFormat, ObservabilityConfig, TimeoutConfig, TracingConfig,
};
