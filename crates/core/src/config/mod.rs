//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (SHELLCACHE_*)
//! 2. TOML config file (if SHELLCACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (SHELLCACHE_*)
/// 2. TOML config file (if SHELLCACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application identifier, the first part of every cache generation name.
    ///
    /// Set via SHELLCACHE_APP_ID environment variable.
    #[serde(default = "default_app_id")]
    pub app_id: String,

    /// Current cache version. Bump it whenever the shell manifest changes.
    ///
    /// Set via SHELLCACHE_CACHE_VERSION environment variable.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// Origin the shell manifest paths are resolved against.
    ///
    /// Set via SHELLCACHE_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Ordered app shell resource paths, relative to `origin`.
    ///
    /// Set via SHELLCACHE_SHELL_MANIFEST environment variable.
    #[serde(default = "default_shell_manifest")]
    pub shell_manifest: Vec<String>,

    /// Manifest entry served to navigations when the network is unreachable.
    ///
    /// Set via SHELLCACHE_OFFLINE_DOCUMENT environment variable.
    #[serde(default = "default_offline_document")]
    pub offline_document: String,

    /// Host substrings whose requests are never intercepted.
    ///
    /// Set via SHELLCACHE_EXCLUDED_HOSTS environment variable.
    #[serde(default = "default_excluded_hosts")]
    pub excluded_hosts: Vec<String>,

    /// URL scheme prefixes whose requests are never intercepted.
    ///
    /// Set via SHELLCACHE_EXCLUDED_SCHEMES environment variable.
    #[serde(default = "default_excluded_schemes")]
    pub excluded_schemes: Vec<String>,

    /// Path to SQLite cache database.
    ///
    /// Set via SHELLCACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via SHELLCACHE_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Largest app shell resource install will store. Routed responses are not capped.
    ///
    /// Set via SHELLCACHE_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds, enforced by the transport.
    ///
    /// Set via SHELLCACHE_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_app_id() -> String {
    "nata-escolar".into()
}

fn default_cache_version() -> String {
    "v1".into()
}

fn default_origin() -> String {
    "http://localhost:8080/".into()
}

fn default_shell_manifest() -> Vec<String> {
    vec![
        "Sistema Escolar NATA.html".into(),
        "manifest.json".into(),
        "icons/icon-192x192.png".into(),
        "icons/icon-512x512.png".into(),
    ]
}

fn default_offline_document() -> String {
    "Sistema Escolar NATA.html".into()
}

fn default_excluded_hosts() -> Vec<String> {
    vec!["firestore.googleapis.com".into(), "firebaseio.com".into(), "identitytoolkit.googleapis.com".into()]
}

fn default_excluded_schemes() -> Vec<String> {
    vec!["chrome-extension".into(), "moz-extension".into(), "safari-web-extension".into()]
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./shellcache.sqlite")
}

fn default_user_agent() -> String {
    "shellcache/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_id: default_app_id(),
            cache_version: default_cache_version(),
            origin: default_origin(),
            shell_manifest: default_shell_manifest(),
            offline_document: default_offline_document(),
            excluded_hosts: default_excluded_hosts(),
            excluded_schemes: default_excluded_schemes(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Name of the current cache generation: `<app-id>-cache-<version>`.
    pub fn cache_name(&self) -> String {
        format!("{}-cache-{}", self.app_id, self.cache_version)
    }

    /// Parsed origin URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the origin is not an absolute http(s) URL.
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            scheme => Err(ConfigError::Invalid {
                field: "origin".into(),
                reason: format!("unsupported scheme: {scheme}"),
            }),
        }
    }

    /// Shell manifest resolved to absolute URLs, in manifest order.
    pub fn manifest_urls(&self) -> Result<Vec<Url>, ConfigError> {
        let origin = self.origin_url()?;
        self.shell_manifest
            .iter()
            .map(|path| {
                origin.join(path).map_err(|e| ConfigError::Invalid {
                    field: "shell_manifest".into(),
                    reason: format!("{path}: {e}"),
                })
            })
            .collect()
    }

    /// Absolute URL of the offline document.
    pub fn offline_url(&self) -> Result<Url, ConfigError> {
        let origin = self.origin_url()?;
        origin.join(&self.offline_document).map_err(|e| ConfigError::Invalid {
            field: "offline_document".into(),
            reason: e.to_string(),
        })
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `SHELLCACHE_`
    /// 2. TOML file from `SHELLCACHE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_file(None)
    }

    /// Like [`AppConfig::load`], but an explicit `config_file` takes the
    /// place of `SHELLCACHE_CONFIG_FILE`.
    pub fn load_with_file(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        let config_path = config_file
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os("SHELLCACHE_CONFIG_FILE").map(PathBuf::from));
        if let Some(config_path) = config_path {
            if !config_path.exists() {
                return Err(ConfigError::LoadFailed(format!("config file not found: {}", config_path.display())));
            }
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("SHELLCACHE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.app_id, "nata-escolar");
        assert_eq!(config.cache_version, "v1");
        assert_eq!(config.db_path, PathBuf::from("./shellcache.sqlite"));
        assert_eq!(config.user_agent, "shellcache/0.1");
        assert_eq!(config.max_bytes, 5_242_880);
        assert_eq!(config.timeout_ms, 20_000);
        assert_eq!(config.shell_manifest.len(), 4);
        assert!(config.shell_manifest.contains(&config.offline_document));
    }

    #[test]
    fn test_cache_name() {
        let config = AppConfig { app_id: "demo".into(), cache_version: "v7".into(), ..Default::default() };
        assert_eq!(config.cache_name(), "demo-cache-v7");
    }

    #[test]
    fn test_timeout_duration() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(20_000));
    }

    #[test]
    fn test_manifest_urls_resolve_against_origin() {
        let config = AppConfig {
            origin: "https://school.example/app/".into(),
            shell_manifest: vec!["index.html".into(), "/manifest.json".into(), "icons/a b.png".into()],
            offline_document: "index.html".into(),
            ..Default::default()
        };
        let urls = config.manifest_urls().unwrap();
        assert_eq!(urls[0].as_str(), "https://school.example/app/index.html");
        assert_eq!(urls[1].as_str(), "https://school.example/manifest.json");
        assert_eq!(urls[2].as_str(), "https://school.example/app/icons/a%20b.png");
        assert_eq!(config.offline_url().unwrap(), urls[0]);
    }

    #[test]
    fn test_origin_rejects_non_http() {
        let config = AppConfig { origin: "file:///srv/app/".into(), ..Default::default() };
        assert!(matches!(config.origin_url(), Err(ConfigError::Invalid { field, .. }) if field == "origin"));
    }

    #[test]
    fn test_load_layers_file_and_env() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "shellcache.toml",
                r#"
                app_id = "from-file"
                cache_version = "v2"
                shell_manifest = ["/index.html", "/manifest.json", "/icon.png"]
                offline_document = "/index.html"
                "#,
            )?;
            jail.set_env("SHELLCACHE_CONFIG_FILE", "shellcache.toml");
            jail.set_env("SHELLCACHE_CACHE_VERSION", "v3");

            let config = AppConfig::load().map_err(|e| figment::Error::from(e.to_string()))?;
            assert_eq!(config.app_id, "from-file");
            assert_eq!(config.cache_version, "v3");
            assert_eq!(config.cache_name(), "from-file-cache-v3");
            assert_eq!(config.shell_manifest.len(), 3);
            Ok(())
        });
    }

    #[test]
    fn test_load_explicit_file_wins_over_env() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("env.toml", "cache_version = \"from-env\"")?;
            jail.create_file("explicit.toml", "cache_version = \"from-flag\"")?;
            jail.set_env("SHELLCACHE_CONFIG_FILE", "env.toml");

            let config = AppConfig::load_with_file(Some(Path::new("explicit.toml")))
                .map_err(|e| figment::Error::from(e.to_string()))?;
            assert_eq!(config.cache_version, "from-flag");
            Ok(())
        });
    }

    #[test]
    fn test_load_missing_file() {
        let result = AppConfig::load_with_file(Some(Path::new("/nonexistent/shellcache.toml")));
        assert!(matches!(result, Err(ConfigError::LoadFailed(_))));
    }
}
