//! Tracing Subscriber Initialization
//!
//! Structured logging for processes embedding the invalidator. JSON output
//! by default; `ROWCACHE_LOG_FORMAT=plain` switches to human-readable lines.
//! `RUST_LOG` overrides the default filter.

use rowcache_core::constants::{DEFAULT_LOG_FILTER, ENV_LOG_FORMAT};
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output format of the log layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Json,
    Plain,
}

impl LogFormat {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Some(LogFormat::Json),
            "plain" | "text" => Some(LogFormat::Plain),
            _ => None,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    pub log_format: LogFormat,
    /// Filter used when `RUST_LOG` is unset
    pub default_filter: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::default(),
            default_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl TelemetryConfig {
    /// Create TelemetryConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `ROWCACHE_LOG_FORMAT`: `json` (default) or `plain`
    pub fn from_env() -> Self {
        let log_format = std::env::var(ENV_LOG_FORMAT)
            .ok()
            .and_then(|s| LogFormat::parse(&s))
            .unwrap_or_default();

        Self {
            log_format,
            ..Self::default()
        }
    }
}

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Failed to init subscriber: {0}")]
    Init(String),
}

/// Install the global tracing subscriber.
///
/// Call once at startup. Fails if a global subscriber is already set.
pub fn init_tracing(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));
    let registry = tracing_subscriber::registry().with(env_filter);

    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        LogFormat::Plain => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    }
    .map_err(|e| TelemetryError::Init(e.to_string()))?;

    tracing::info!(log_format = ?config.log_format, "Telemetry initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowcache_test_utils::fixtures::EnvVarGuard;

    #[test]
    fn test_telemetry_config_from_env() {
        {
            let _guard = EnvVarGuard::set(ENV_LOG_FORMAT, None);
            let config = TelemetryConfig::from_env();
            assert_eq!(config, TelemetryConfig::default());
            assert_eq!(config.log_format, LogFormat::Json);
            assert_eq!(config.default_filter, DEFAULT_LOG_FILTER);
        }
        {
            let _guard = EnvVarGuard::set(ENV_LOG_FORMAT, Some("Plain"));
            assert_eq!(TelemetryConfig::from_env().log_format, LogFormat::Plain);
        }
        {
            let _guard = EnvVarGuard::set(ENV_LOG_FORMAT, Some("xml"));
            assert_eq!(TelemetryConfig::from_env().log_format, LogFormat::Json);
        }
    }

    #[test]
    fn test_second_init_fails() {
        let config = TelemetryConfig {
            log_format: LogFormat::Plain,
            ..TelemetryConfig::default()
        };
        let _ = init_tracing(&config);
        assert!(matches!(init_tracing(&config), Err(TelemetryError::Init(_))));
    }
}
