//! Remote config gateway trait.

use crate::core::ChangeToken;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;

/// A namespace's content as served by the remote service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    /// Raw, unparsed content.
    pub content: String,
    /// Key/value pairs exactly as the service stores them, if it stores
    /// the namespace as a map. When present they are used as the flat
    /// content and the client's parser is skipped.
    pub properties: Option<BTreeMap<String, String>>,
    /// Version marker of this content.
    pub change_token: ChangeToken,
}

impl RemoteConfig {
    /// Bundle raw content with its token.
    pub fn new(content: impl Into<String>, change_token: impl Into<ChangeToken>) -> Self {
        Self {
            content: content.into(),
            properties: None,
            change_token: change_token.into(),
        }
    }

    /// Attach the service's own key/value map.
    pub fn with_properties(mut self, properties: BTreeMap<String, String>) -> Self {
        self.properties = Some(properties);
        self
    }
}

/// Capability interface over the remote configuration service.
///
/// Implement this trait to connect the client to a config service. The
/// crate ships an Apollo-style HTTP implementation behind the `remote`
/// feature.
///
/// Both operations report network or protocol failures as
/// [`ConfigError::TransportError`](crate::error::ConfigError::TransportError).
#[async_trait]
pub trait ConfigGateway: Send + Sync {
    /// Fetch the full content of `namespace`.
    ///
    /// # Errors
    ///
    /// Returns `NotFoundError` if the namespace does not exist remotely and
    /// `TransportError` on network or protocol failure.
    async fn fetch_config(&self, namespace: &str) -> Result<RemoteConfig>;

    /// Block until `namespace` changes past `since`, or until `timeout`.
    ///
    /// On timeout the implementation returns `since` unchanged so the caller
    /// can simply poll again.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` on connection failure.
    async fn await_change(
        &self,
        namespace: &str,
        since: &ChangeToken,
        timeout: Duration,
    ) -> Result<ChangeToken>;

    /// Human-readable name for logging.
    fn name(&self) -> String {
        "gateway".to_string()
    }
}
