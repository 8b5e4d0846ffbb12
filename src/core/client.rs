//! The client handle exposing listener registration and property reads.

use crate::core::{ChangeToken, ConfigSnapshot, SnapshotCache};
use crate::error::{ConfigError, Result};
use crate::notify::poller::run_poll_loop;
use crate::notify::{BackoffConfig, ConfigurationListener, ListenerRegistry};
use crate::sources::{ConfigGateway, ConfigurationParser};
use arc_swap::ArcSwap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

#[cfg(feature = "metrics")]
use crate::metrics::ConfigMetrics;

/// State shared between the client handle and its poll loops.
pub(crate) struct ClientShared {
    pub(crate) gateway: Arc<dyn ConfigGateway>,
    pub(crate) parser: ArcSwap<Box<dyn ConfigurationParser>>,
    pub(crate) cache: SnapshotCache,
    pub(crate) registry: ListenerRegistry,
    pub(crate) default_namespace: String,
    pub(crate) poll_timeout: Duration,
    pub(crate) backoff: BackoffConfig,
    #[cfg(feature = "metrics")]
    pub(crate) metrics: Option<ConfigMetrics>,
}

impl ClientShared {
    /// Fetch and parse `namespace`, optionally stamping it with `token`
    /// instead of the token the fetch returned.
    ///
    /// A map served by the gateway is taken as is; only raw text goes
    /// through the parser.
    pub(crate) async fn fetch_snapshot(
        &self,
        namespace: &str,
        token: Option<ChangeToken>,
    ) -> Result<ConfigSnapshot> {
        let remote = self.gateway.fetch_config(namespace).await?;
        let content = match remote.properties {
            Some(properties) => properties,
            None => self.parser.load().parse(&remote.content)?,
        };
        Ok(ConfigSnapshot::new(
            namespace,
            remote.content,
            content,
            token.unwrap_or(remote.change_token),
        ))
    }

    /// Current snapshot of `namespace`, fetching it on a cold cache.
    async fn cached_or_fetch(&self, namespace: &str) -> Result<Arc<ConfigSnapshot>> {
        if let Some(snapshot) = self.cache.get(namespace) {
            return Ok(snapshot);
        }
        let snapshot = self.fetch_snapshot(namespace, None).await?;
        debug!(namespace = %namespace, token = %snapshot.change_token(), "fetched on demand");
        Ok(self.cache.put_if_absent(snapshot))
    }

    pub(crate) fn record_refresh(&self, namespace: &str, started: Instant, success: bool) {
        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.metrics {
            metrics.record_refresh(namespace, started.elapsed(), success);
        }
        #[cfg(not(feature = "metrics"))]
        let _ = (namespace, started, success);
    }

    pub(crate) fn record_dispatch(&self, namespace: &str, delivered: usize, faults: usize) {
        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.metrics {
            metrics.record_dispatch(namespace, delivered as u64, faults as u64);
        }
        #[cfg(not(feature = "metrics"))]
        let _ = (namespace, delivered, faults);
    }

    pub(crate) fn record_poll_error(&self, namespace: &str) {
        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.metrics {
            metrics.record_poll_error(namespace);
        }
        #[cfg(not(feature = "metrics"))]
        let _ = namespace;
    }

    fn record_listener_count(&self, namespace: &str) {
        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.metrics {
            metrics.update_listener_count(namespace, self.registry.listener_count(namespace) as i64);
        }
        #[cfg(not(feature = "metrics"))]
        let _ = namespace;
    }
}

/// Client keeping local configuration in sync with a remote config service.
///
/// Registering the first listener for a namespace starts a background
/// long-poll loop for it; every remote change is diffed against the cached
/// snapshot and delivered as one [`ConfigChangeEvent`](crate::core::ConfigChangeEvent)
/// per changed key. Removing the last listener stops the loop at its next
/// loop boundary. Snapshots stay cached after that, so later reads do not
/// refetch.
///
/// The handle is cheap to clone; clones share state.
///
/// # Examples
///
/// ```rust,no_run
/// use remote_config_watch::prelude::*;
/// use remote_config_watch::sources::HttpGateway;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<()> {
/// let gateway = HttpGateway::builder()
///     .with_address("http://config.example.com:8080")
///     .with_app_id("orders")
///     .build()?;
///
/// let client = ConfigClient::builder()
///     .with_gateway(gateway)
///     .build()?;
///
/// let listener: Arc<dyn ConfigurationListener> = Arc::new(|event: &ConfigChangeEvent| {
///     println!("{event}");
/// });
/// client.add_listener("application", Arc::clone(&listener))?;
///
/// let raw = client.get_properties("application").await?;
/// println!("{raw}");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ConfigClient {
    shared: Arc<ClientShared>,
}

impl ConfigClient {
    pub(crate) fn from_shared(shared: ClientShared) -> Self {
        Self {
            shared: Arc::new(shared),
        }
    }

    /// Register `listener` for change events on `namespace`.
    ///
    /// Registering the same `Arc` again is a no-op. The first listener of a
    /// namespace starts its poll loop; only the registration step can fail
    /// here, never the polling that follows.
    ///
    /// # Errors
    ///
    /// Returns `RegistrationError` if the namespace is empty or no tokio runtime
    /// is available to run the poll loop.
    pub fn add_listener(
        &self,
        namespace: &str,
        listener: Arc<dyn ConfigurationListener>,
    ) -> Result<()> {
        validate_namespace(namespace)?;
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(ConfigError::RegistrationError(
                "add_listener must be called from within a tokio runtime".to_string(),
            ));
        }

        let shared = &self.shared;
        let added = shared.registry.add(namespace, listener, |slot| {
            tokio::spawn(run_poll_loop(Arc::clone(shared), slot))
        });

        if added {
            info!(namespace = %namespace, "listener registered");
            shared.record_listener_count(namespace);
        } else {
            debug!(namespace = %namespace, "listener already registered");
        }
        Ok(())
    }

    /// Unregister `listener` from `namespace`.
    ///
    /// Once this returns the listener receives no new events. A delivery
    /// that was already in flight on the poll task when `remove_listener`
    /// was called may still complete, so a listener can observe at most one
    /// more call while removal races a dispatch. Removing a listener that
    /// is not registered is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `RegistrationError` if the namespace is empty.
    pub fn remove_listener(
        &self,
        namespace: &str,
        listener: &Arc<dyn ConfigurationListener>,
    ) -> Result<()> {
        validate_namespace(namespace)?;

        if self.shared.registry.remove(namespace, listener) {
            info!(namespace = %namespace, "listener removed");
            self.shared.record_listener_count(namespace);
        } else {
            debug!(namespace = %namespace, "listener was not registered");
        }
        Ok(())
    }

    /// Raw content of `namespace`, from cache or fetched on demand.
    ///
    /// This never starts a poll loop.
    ///
    /// # Errors
    ///
    /// Returns `NotFoundError` if the namespace does not exist remotely,
    /// `TransportError` if it cannot be fetched and `ParseError` if its content is
    /// malformed.
    pub async fn get_properties(&self, namespace: &str) -> Result<String> {
        let snapshot = self.shared.cached_or_fetch(namespace).await?;
        Ok(snapshot.raw().to_string())
    }

    /// Value of `key` in the default namespace.
    ///
    /// # Errors
    ///
    /// Returns `PropertyNotFound` if the key is absent, or any error from
    /// fetching the default namespace on a cold cache.
    pub async fn get_internal_property(&self, key: &str) -> Result<String> {
        let snapshot = self
            .shared
            .cached_or_fetch(&self.shared.default_namespace)
            .await?;
        snapshot
            .get(key)
            .map(str::to_string)
            .ok_or_else(|| ConfigError::PropertyNotFound(key.to_string()))
    }

    /// Cached snapshot of `namespace`, without fetching.
    pub fn snapshot(&self, namespace: &str) -> Option<Arc<ConfigSnapshot>> {
        self.shared.cache.get(namespace)
    }

    /// Replace the parser used for subsequent fetches.
    ///
    /// Already cached snapshots are not reparsed.
    pub fn set_parser<P: ConfigurationParser + 'static>(&self, parser: P) {
        debug!(parser = parser.name(), "parser replaced");
        let parser: Box<dyn ConfigurationParser> = Box::new(parser);
        self.shared.parser.store(Arc::new(parser));
    }

    /// The namespace used by [`get_internal_property`](Self::get_internal_property).
    pub fn default_namespace(&self) -> &str {
        &self.shared.default_namespace
    }

    /// Whether a poll loop is currently running for `namespace`.
    pub fn is_polling(&self, namespace: &str) -> bool {
        self.shared.registry.is_polling(namespace)
    }

    /// Number of listeners registered for `namespace`.
    pub fn listener_count(&self, namespace: &str) -> usize {
        self.shared.registry.listener_count(namespace)
    }

    /// Listeners registered for `namespace`, as a detached copy.
    pub fn listeners(&self, namespace: &str) -> Vec<Arc<dyn ConfigurationListener>> {
        self.shared.registry.snapshot_listeners(namespace)
    }

    /// Drop every listener and wait for all poll loops to stop.
    ///
    /// Loops finish their in-flight long poll first, so this can take up to
    /// the poll timeout.
    pub async fn shutdown(&self) {
        let tasks = self.shared.registry.drain();
        info!(loops = tasks.len(), "shutting down poll loops");
        for task in tasks {
            let _ = task.await;
        }
    }
}

fn validate_namespace(namespace: &str) -> Result<()> {
    if namespace.trim().is_empty() {
        return Err(ConfigError::RegistrationError(
            "namespace must not be empty".to_string(),
        ));
    }
    Ok(())
}
