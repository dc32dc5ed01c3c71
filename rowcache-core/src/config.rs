//! Configuration types

use crate::constants::{DEFAULT_RETRY_BACKOFF_MS, ENV_RETRY_BACKOFF_MS};
use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the invalidation service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidatorConfig {
    /// Pause before reopening the stream after a failure (default: 1 second)
    pub retry_backoff: Duration,
}

impl Default for InvalidatorConfig {
    fn default() -> Self {
        Self {
            retry_backoff: Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
        }
    }
}

impl InvalidatorConfig {
    /// Create InvalidatorConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `ROWCACHE_RETRY_BACKOFF_MS`: Pause between stream retries (default: 1000)
    pub fn from_env() -> Self {
        let retry_backoff = Duration::from_millis(
            std::env::var(ENV_RETRY_BACKOFF_MS)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_RETRY_BACKOFF_MS),
        );

        Self { retry_backoff }
    }

    /// Create a configuration for development/testing with a short backoff.
    pub fn development() -> Self {
        Self {
            retry_backoff: Duration::from_millis(10),
        }
    }
}

/// Replication source settings the invalidator depends on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Directory holding the server's binary logs
    pub binlog_path: Option<String>,
}

impl SourceConfig {
    pub fn new(binlog_path: impl Into<String>) -> Self {
        Self {
            binlog_path: Some(binlog_path.into()),
        }
    }

    /// Check that every field required for streaming is present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.binlog_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Ok(()),
            _ => Err(ConfigError::MissingRequired {
                field: "binlog_path".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowcache_test_utils::fixtures::EnvVarGuard;

    #[test]
    fn test_invalidator_config_from_env() {
        {
            let _guard = EnvVarGuard::set(ENV_RETRY_BACKOFF_MS, None);
            assert_eq!(InvalidatorConfig::from_env(), InvalidatorConfig::default());
            assert_eq!(
                InvalidatorConfig::default().retry_backoff,
                Duration::from_secs(1)
            );
        }
        {
            let _guard = EnvVarGuard::set(ENV_RETRY_BACKOFF_MS, Some("250"));
            assert_eq!(
                InvalidatorConfig::from_env().retry_backoff,
                Duration::from_millis(250)
            );
        }
        {
            let _guard = EnvVarGuard::set(ENV_RETRY_BACKOFF_MS, Some("soon"));
            assert_eq!(
                InvalidatorConfig::from_env().retry_backoff,
                Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS)
            );
        }
    }

    #[test]
    fn test_source_config_requires_binlog_path() {
        assert!(SourceConfig::new("/var/lib/mysql/binlogs").validate().is_ok());
        assert_eq!(
            SourceConfig::default().validate(),
            Err(ConfigError::MissingRequired {
                field: "binlog_path".to_string()
            })
        );
        assert!(SourceConfig::new("  ").validate().is_err());
    }
}
