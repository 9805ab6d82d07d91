//! Configuration validation rules.
//!
//! This module provides validation logic for `WorkerConfig` values after
//! they have been loaded from environment, files, or defaults.

use thiserror::Error;
use url::Url;

use crate::config::WorkerConfig;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl WorkerConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `cache_version` or `user_agent` is empty
    /// - `base_url` is not an absolute URL
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - any precache manifest entry is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_version.is_empty() {
            return Err(ConfigError::Invalid {
                field: "cache_version".into(),
                reason: "must not be empty".into(),
            });
        }

        if Url::parse(&self.base_url).is_err() {
            return Err(ConfigError::Invalid {
                field: "base_url".into(),
                reason: "must be an absolute URL".into(),
            });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must be at least 100ms".into(),
            });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid {
                field: "user_agent".into(),
                reason: "must not be empty".into(),
            });
        }

        if self.precache_manifest.iter().any(|entry| entry.is_empty()) {
            return Err(ConfigError::Invalid {
                field: "precache_manifest".into(),
                reason: "entries must not be empty".into(),
            });
        }

        if self.precache_manifest.is_empty() {
            tracing::warn!("precache_manifest is empty; nothing will be served offline by default");
        }

        Ok(())
    }
}
