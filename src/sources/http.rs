//! Apollo-style HTTP gateway.

use super::gateway::{ConfigGateway, RemoteConfig};
use super::parser::PropertiesParser;
use crate::core::{ChangeToken, RemoteSettings};
use crate::error::{ConfigError, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, header::HeaderValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Notification id the server treats as "never seen".
const UNKNOWN_NOTIFICATION_ID: i64 = -1;

/// Extra time granted to a long poll beyond the server's hold time.
const LONG_POLL_MARGIN: Duration = Duration::from_secs(10);

/// Key holding the whole document for yaml/json/txt namespaces.
const TEXT_CONTENT_KEY: &str = "content";

#[derive(Debug, Deserialize)]
struct ConfigResponse {
    #[serde(default)]
    configurations: BTreeMap<String, String>,
    #[serde(rename = "releaseKey", default)]
    release_key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NotificationRequest<'a> {
    namespace_name: &'a str,
    notification_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Notification {
    namespace_name: String,
    notification_id: i64,
}

/// Gateway for an Apollo-compatible config service.
///
/// - `fetch_config` reads `GET {address}/configs/{app_id}/{cluster}/{namespace}`
///   and uses the release key as change token. The served `configurations`
///   map is passed on as the namespace's properties, so lookups see keys
///   exactly as stored (a text namespace keeps its document under `content`).
/// - `await_change` long-polls `GET {address}/notifications/v2` and uses the
///   notification id as change token. A token that is not a notification id
///   (such as a release key) is sent as `-1`, which the server answers at once.
///
/// # Examples
///
/// ```rust,no_run
/// use remote_config_watch::sources::HttpGateway;
/// use std::time::Duration;
///
/// # fn example() -> remote_config_watch::error::Result<()> {
/// let gateway = HttpGateway::builder()
///     .with_address("http://config.example.com:8080")
///     .with_app_id("orders")
///     .with_cluster("default")
///     .with_timeout(Duration::from_secs(10))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct HttpGateway {
    address: String,
    app_id: String,
    cluster: String,
    auth_token: Option<String>,
    client: Client,
}

impl HttpGateway {
    /// Create a new builder for constructing an HTTP gateway.
    pub fn builder() -> HttpGatewayBuilder {
        HttpGatewayBuilder::new()
    }

    /// Build a gateway from loaded client settings.
    ///
    /// # Errors
    ///
    /// Returns an error if no address is configured.
    pub fn from_settings(settings: &RemoteSettings) -> Result<Self> {
        let mut builder = Self::builder()
            .with_app_id(settings.app_id.clone())
            .with_cluster(settings.cluster.clone())
            .with_timeout(settings.request_timeout());
        if let Some(address) = &settings.address {
            builder = builder.with_address(address.clone());
        }
        if let Some(token) = &settings.auth_token {
            builder = builder.with_auth_token(token.clone());
        }
        builder.build()
    }

    fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        match &self.auth_token {
            None => Ok(request),
            Some(token) => {
                let header_value = HeaderValue::from_str(&format!("Bearer {}", token))
                    .map_err(|e| ConfigError::Other(format!("Invalid bearer token: {}", e)))?;
                Ok(request.header("Authorization", header_value))
            }
        }
    }

    fn config_url(&self, namespace: &str) -> String {
        format!(
            "{}/configs/{}/{}/{}",
            self.address, self.app_id, self.cluster, namespace
        )
    }
}

#[async_trait]
impl ConfigGateway for HttpGateway {
    async fn fetch_config(&self, namespace: &str) -> Result<RemoteConfig> {
        let request = self.authorize(self.client.get(self.config_url(namespace)))?;
        let response = request
            .send()
            .await
            .map_err(|e| ConfigError::TransportError(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ConfigError::NotFoundError(namespace.to_string()));
        }
        if !status.is_success() {
            return Err(ConfigError::TransportError(format!(
                "HTTP request failed with status {}: {}",
                status,
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        let body: ConfigResponse = response
            .json()
            .await
            .map_err(|e| ConfigError::TransportError(format!("Failed to decode config: {}", e)))?;

        let content = render_content(&body.configurations);
        Ok(RemoteConfig::new(content, ChangeToken::new(body.release_key))
            .with_properties(body.configurations))
    }

    async fn await_change(
        &self,
        namespace: &str,
        since: &ChangeToken,
        timeout: Duration,
    ) -> Result<ChangeToken> {
        let notification_id = since
            .as_str()
            .parse::<i64>()
            .unwrap_or(UNKNOWN_NOTIFICATION_ID);
        let notifications = serde_json::to_string(&[NotificationRequest {
            namespace_name: namespace,
            notification_id,
        }])
        .map_err(|e| ConfigError::Other(format!("Failed to encode notifications: {}", e)))?;

        let request = self
            .client
            .get(format!("{}/notifications/v2", self.address))
            .query(&[
                ("appId", self.app_id.as_str()),
                ("cluster", self.cluster.as_str()),
                ("notifications", notifications.as_str()),
            ])
            .timeout(timeout + LONG_POLL_MARGIN);
        let request = self.authorize(request)?;

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => return Ok(since.clone()),
            Err(e) => {
                return Err(ConfigError::TransportError(format!("Long poll failed: {}", e)));
            }
        };

        let status = response.status();
        if status == StatusCode::NOT_MODIFIED {
            return Ok(since.clone());
        }
        if !status.is_success() {
            return Err(ConfigError::TransportError(format!(
                "Long poll failed with status {}: {}",
                status,
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        let notifications: Vec<Notification> = response
            .json()
            .await
            .map_err(|e| ConfigError::TransportError(format!("Failed to decode notifications: {}", e)))?;

        Ok(notifications
            .into_iter()
            .find(|n| n.namespace_name == namespace)
            .map(|n| ChangeToken::new(n.notification_id.to_string()))
            .unwrap_or_else(|| since.clone()))
    }

    fn name(&self) -> String {
        format!("http:{}", self.address)
    }
}

/// Text namespaces carry their document under a single `content` key;
/// property namespaces are rendered back as escaped `key=value` lines.
fn render_content(configurations: &BTreeMap<String, String>) -> String {
    if configurations.len() == 1 {
        if let Some(content) = configurations.get(TEXT_CONTENT_KEY) {
            return content.clone();
        }
    }
    PropertiesParser::render(configurations)
}

/// Builder for constructing an `HttpGateway`.
pub struct HttpGatewayBuilder {
    address: Option<String>,
    app_id: String,
    cluster: String,
    auth_token: Option<String>,
    timeout: Duration,
}

impl HttpGatewayBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        let defaults = RemoteSettings::default();
        let timeout = defaults.request_timeout();
        Self {
            address: None,
            app_id: defaults.app_id,
            cluster: defaults.cluster,
            auth_token: None,
            timeout,
        }
    }

    /// Set the base address of the config service, e.g. `http://host:8080`.
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Set the application id.
    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = app_id.into();
        self
    }

    /// Set the cluster name. Default is `default`.
    pub fn with_cluster(mut self, cluster: impl Into<String>) -> Self {
        self.cluster = cluster.into();
        self
    }

    /// Set Bearer token authentication.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Set the timeout for config fetches.
    ///
    /// Long polls use their own timeout derived from the poll timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the HTTP gateway.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No address is provided
    /// - The HTTP client cannot be constructed
    pub fn build(self) -> Result<HttpGateway> {
        let address = self
            .address
            .ok_or_else(|| ConfigError::Other("Address is required for HttpGateway".to_string()))?;

        let client = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| ConfigError::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(HttpGateway {
            address: address.trim_end_matches('/').to_string(),
            app_id: self.app_id,
            cluster: self.cluster,
            auth_token: self.auth_token,
            client,
        })
    }
}

impl Default for HttpGatewayBuilder {
    fn default() -> Self {
        Self::new()
    }
}
