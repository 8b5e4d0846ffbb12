//! Client settings loaded from files and environment variables.

use crate::error::{ConfigError, Result};
use crate::notify::BackoffConfig;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Settings for a [`ConfigClient`](crate::core::ConfigClient).
///
/// Every field has a default, so an empty file is a valid configuration.
///
/// # Examples
///
/// ```yaml
/// default_namespace: application
/// poll_timeout_ms: 60000
/// backoff:
///   base_ms: 1000
///   max_ms: 60000
/// remote:
///   address: http://config.example.com:8080
///   app_id: orders
///   cluster: default
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Namespace used by `get_internal_property`.
    pub default_namespace: String,
    /// How long a single long poll may be held by the server, in milliseconds.
    pub poll_timeout_ms: u64,
    /// Retry policy for failed poll rounds.
    pub backoff: BackoffConfig,
    /// Settings for the built-in HTTP gateway.
    pub remote: RemoteSettings,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            default_namespace: "application".to_string(),
            poll_timeout_ms: 60_000,
            backoff: BackoffConfig::default(),
            remote: RemoteSettings::default(),
        }
    }
}

impl ClientSettings {
    /// Load settings from an optional file plus `{env_prefix}_*` variables.
    ///
    /// The file format is detected from its extension (YAML, TOML, JSON).
    /// Environment variables take precedence over the file and use `__` for
    /// nesting, e.g. `WATCH_REMOTE__APP_ID=orders`.
    ///
    /// # Errors
    ///
    /// Returns `LoadError` if the file cannot be read or a value has the
    /// wrong type.
    pub fn load(path: Option<&Path>, env_prefix: &str) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(env_prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .map_err(|e| ConfigError::LoadError(format!("Failed to build settings: {}", e)))?;

        settings
            .try_deserialize::<Self>()
            .map_err(|e| ConfigError::LoadError(format!("Failed to deserialize settings: {}", e)))
    }

    /// Long-poll hold time as a `Duration`.
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

/// Connection settings for the Apollo-style HTTP gateway.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RemoteSettings {
    /// Base address of the config service; `None` disables the HTTP gateway.
    pub address: Option<String>,
    /// Application id the namespaces belong to.
    pub app_id: String,
    /// Cluster name.
    pub cluster: String,
    /// Timeout for config fetches, in milliseconds.
    pub request_timeout_ms: u64,
    /// Optional Bearer token.
    pub auth_token: Option<String>,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            address: None,
            app_id: String::new(),
            cluster: "default".to_string(),
            request_timeout_ms: 10_000,
            auth_token: None,
        }
    }
}

impl RemoteSettings {
    /// Fetch timeout as a `Duration`.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = ClientSettings::default();
        assert_eq!(settings.default_namespace, "application");
        assert_eq!(settings.poll_timeout(), Duration::from_secs(60));
        assert_eq!(settings.remote.cluster, "default");
        assert_eq!(settings.remote.request_timeout(), Duration::from_secs(10));
        assert!(settings.remote.address.is_none());
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let settings = ClientSettings::load(None, "RCW_UNIT_UNSET").unwrap();
        assert_eq!(settings, ClientSettings::default());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = ClientSettings::load(Some(Path::new("/nonexistent/watch.yaml")), "RCW_UNIT");
        assert!(matches!(result, Err(ConfigError::LoadError(_))));
    }
}
