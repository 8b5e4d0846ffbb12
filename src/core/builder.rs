//! Builder for constructing ConfigClient instances.

use crate::core::client::ClientShared;
use crate::core::{ClientSettings, ConfigClient, SnapshotCache};
use crate::error::{ConfigError, Result};
use crate::notify::{BackoffConfig, ListenerRegistry};
use crate::sources::{ConfigGateway, ConfigurationParser, PropertiesParser};
use arc_swap::ArcSwap;
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "metrics")]
use crate::metrics::ConfigMetrics;

/// Builder for constructing a `ConfigClient`.
///
/// Provides a fluent interface for wiring the gateway, parser and polling
/// behaviour. Without an explicit gateway the builder falls back to the
/// HTTP gateway described by the settings' `remote` section (requires the
/// `remote` feature and a configured address).
///
/// # Examples
///
/// ```rust,no_run
/// use remote_config_watch::prelude::*;
/// use std::path::Path;
///
/// # fn example() -> Result<()> {
/// let settings = ClientSettings::load(Some(Path::new("config/watch.yaml")), "WATCH")?;
///
/// let client = ConfigClient::builder()
///     .with_settings(settings)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ConfigClientBuilder {
    gateway: Option<Arc<dyn ConfigGateway>>,
    parser: Option<Box<dyn ConfigurationParser>>,
    settings: ClientSettings,
    #[cfg(feature = "metrics")]
    metrics: Option<ConfigMetrics>,
}

impl ConfigClientBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            gateway: None,
            parser: None,
            settings: ClientSettings::default(),
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    /// Use `gateway` to talk to the remote service.
    pub fn with_gateway<G: ConfigGateway + 'static>(mut self, gateway: G) -> Self {
        self.gateway = Some(Arc::new(gateway));
        self
    }

    /// Use an already shared gateway.
    pub fn with_shared_gateway(mut self, gateway: Arc<dyn ConfigGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    /// Parse namespace content with `parser`. Default is [`PropertiesParser`].
    pub fn with_parser<P: ConfigurationParser + 'static>(mut self, parser: P) -> Self {
        self.parser = Some(Box::new(parser));
        self
    }

    /// Replace all settings at once, e.g. with [`ClientSettings::load`].
    pub fn with_settings(mut self, settings: ClientSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Set the namespace used by `get_internal_property`.
    pub fn with_default_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.settings.default_namespace = namespace.into();
        self
    }

    /// Set how long a single long poll may be held.
    ///
    /// Teardown requests are noticed once per poll round, so this also
    /// bounds how long an idle loop lingers after its last listener leaves.
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.settings.poll_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the retry policy for failed poll rounds.
    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.settings.backoff = backoff;
        self
    }

    /// Record refresh and dispatch metrics on `meter`.
    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, meter: opentelemetry::metrics::Meter) -> Self {
        self.metrics = Some(ConfigMetrics::new(meter));
        self
    }

    /// Build the client.
    ///
    /// No network traffic happens here; namespaces are fetched on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No gateway was given and none can be built from the settings
    /// - The default namespace is empty
    pub fn build(self) -> Result<ConfigClient> {
        if self.settings.default_namespace.trim().is_empty() {
            return Err(ConfigError::Other(
                "Default namespace must not be empty".to_string(),
            ));
        }

        let gateway = match self.gateway {
            Some(gateway) => gateway,
            None => gateway_from_settings(&self.settings)?,
        };
        let parser = self
            .parser
            .unwrap_or_else(|| Box::new(PropertiesParser) as Box<dyn ConfigurationParser>);

        Ok(ConfigClient::from_shared(ClientShared {
            gateway,
            parser: ArcSwap::from_pointee(parser),
            cache: SnapshotCache::new(),
            registry: ListenerRegistry::new(),
            poll_timeout: self.settings.poll_timeout(),
            default_namespace: self.settings.default_namespace,
            backoff: self.settings.backoff,
            #[cfg(feature = "metrics")]
            metrics: self.metrics,
        }))
    }
}

#[cfg(feature = "remote")]
fn gateway_from_settings(settings: &ClientSettings) -> Result<Arc<dyn ConfigGateway>> {
    if settings.remote.address.is_none() {
        return Err(ConfigError::Other(
            "A gateway is required: call with_gateway or set remote.address".to_string(),
        ));
    }
    let gateway = crate::sources::HttpGateway::from_settings(&settings.remote)?;
    Ok(Arc::new(gateway))
}

#[cfg(not(feature = "remote"))]
fn gateway_from_settings(_settings: &ClientSettings) -> Result<Arc<dyn ConfigGateway>> {
    Err(ConfigError::Other(
        "A gateway is required: call with_gateway".to_string(),
    ))
}

impl Default for ConfigClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigClient {
    /// Create a new builder for constructing a client.
    pub fn builder() -> ConfigClientBuilder {
        ConfigClientBuilder::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_requires_gateway() {
        let result = ConfigClientBuilder::new().build();
        assert!(matches!(result, Err(ConfigError::Other(_))));
    }

    #[test]
    fn test_builder_accumulates_settings() {
        let builder = ConfigClientBuilder::new()
            .with_default_namespace("orders")
            .with_poll_timeout(Duration::from_secs(5))
            .with_backoff(BackoffConfig {
                base_ms: 5,
                ..BackoffConfig::default()
            });

        assert_eq!(builder.settings.default_namespace, "orders");
        assert_eq!(builder.settings.poll_timeout_ms, 5_000);
        assert_eq!(builder.settings.backoff.base_ms, 5);
    }

    #[test]
    fn test_poll_timeout_saturates() {
        let builder = ConfigClientBuilder::new().with_poll_timeout(Duration::MAX);
        assert_eq!(builder.settings.poll_timeout_ms, u64::MAX);
    }

    #[test]
    fn test_builder_rejects_empty_default_namespace() {
        let result = ConfigClientBuilder::new().with_default_namespace("").build();
        assert!(result.is_err());
    }

    #[cfg(feature = "remote")]
    #[test]
    fn test_builder_uses_http_settings() {
        let mut settings = ClientSettings::default();
        settings.remote.address = Some("http://config.local:8080".to_string());
        settings.remote.app_id = "orders".to_string();

        let client = ConfigClientBuilder::new()
            .with_settings(settings)
            .build()
            .unwrap();
        assert_eq!(client.default_namespace(), "application");
    }
}
