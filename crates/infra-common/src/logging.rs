//! Logging setup built on `tracing-subscriber`.
//!
//! The coordination core logs through `tracing` everywhere; this module is
//! the single place a host application configures the subscriber.

use tracing_subscriber::{fmt, EnvFilter};

use crate::errors::{Error, Result};

/// Configuration for the logging subscriber
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Default filter directive, overridable via `RUST_LOG`
    pub filter: String,
    /// Emit JSON-formatted lines instead of human-readable output
    pub json: bool,
    /// Include the event target (module path) in output
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            filter: "info".to_string(),
            json: false,
            with_target: true,
        }
    }
}

impl LoggingConfig {
    /// Create a configuration with the given default filter directive
    pub fn new(filter: impl Into<String>) -> Self {
        LoggingConfig {
            filter: filter.into(),
            ..Default::default()
        }
    }

    /// Emit JSON-formatted log lines
    pub fn with_json(mut self) -> Self {
        self.json = true;
        self
    }

    /// Suppress the event target in output
    pub fn without_target(mut self) -> Self {
        self.with_target = false;
        self
    }
}

/// Install the global logging subscriber.
///
/// Uses `try_init` so a second call (common in test binaries) reports an
/// error instead of panicking.
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .map_err(|e| Error::Config(format!("invalid log filter '{}': {}", config.filter, e)))?;

    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(config.with_target);

    let result = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    result.map_err(|e| Error::Config(format!("logging already initialized: {}", e)))
}
