//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if `app_id`, `cache_version` or
    /// `shell_manifest` is empty, and `ConfigError::Invalid` if:
    /// - `origin` is not an absolute http(s) URL, or a manifest path does not resolve
    /// - `offline_document` is not listed in `shell_manifest`
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.app_id.trim().is_empty() {
            return Err(ConfigError::Missing { field: "app_id".into(), hint: "Set SHELLCACHE_APP_ID".into() });
        }
        if self.cache_version.trim().is_empty() {
            return Err(ConfigError::Missing {
                field: "cache_version".into(),
                hint: "Set SHELLCACHE_CACHE_VERSION".into(),
            });
        }
        if self.shell_manifest.is_empty() {
            return Err(ConfigError::Missing {
                field: "shell_manifest".into(),
                hint: "List the app shell resources in the config file".into(),
            });
        }

        let manifest = self.manifest_urls()?;
        let offline = self.offline_url()?;
        if !manifest.contains(&offline) {
            return Err(ConfigError::Invalid {
                field: "offline_document".into(),
                reason: format!("{} is not part of shell_manifest", self.offline_document),
            });
        }

        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must not exceed 50MB".into() });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if self.excluded_hosts.is_empty() {
            tracing::warn!("excluded_hosts is empty; backend API traffic will be intercepted");
        }

        Ok(())
    }
}
