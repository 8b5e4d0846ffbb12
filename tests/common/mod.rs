//! In-memory config service shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use remote_config_watch::core::{ChangeToken, ConfigChangeEvent};
use remote_config_watch::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, sleep, timeout_at};

/// Gateway backed by a map of namespace to (version, content).
///
/// Every `publish` bumps a global version; `await_change` wakes on it.
#[derive(Clone)]
pub struct MockGateway {
    inner: Arc<Inner>,
}

struct Inner {
    namespaces: Mutex<HashMap<String, (u64, String)>>,
    version: watch::Sender<u64>,
    fail_polls: AtomicUsize,
    fail_fetches: AtomicUsize,
    polls: AtomicUsize,
    fetches: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockGateway {
    pub fn new() -> Self {
        let (version, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                namespaces: Mutex::new(HashMap::new()),
                version,
                fail_polls: AtomicUsize::new(0),
                fail_fetches: AtomicUsize::new(0),
                polls: AtomicUsize::new(0),
                fetches: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }),
        }
    }

    /// Store `content` for `namespace` under a fresh version.
    pub fn publish(&self, namespace: &str, content: &str) {
        let mut namespaces = self.inner.namespaces.lock();
        let next = *self.inner.version.borrow() + 1;
        namespaces.insert(namespace.to_string(), (next, content.to_string()));
        self.inner.version.send_replace(next);
    }

    pub fn remove(&self, namespace: &str) {
        self.inner.namespaces.lock().remove(namespace);
    }

    pub fn fail_next_polls(&self, count: usize) {
        self.inner.fail_polls.store(count, Ordering::SeqCst);
    }

    pub fn fail_next_fetches(&self, count: usize) {
        self.inner.fail_fetches.store(count, Ordering::SeqCst);
    }

    pub fn polls(&self) -> usize {
        self.inner.polls.load(Ordering::SeqCst)
    }

    pub fn fetches(&self) -> usize {
        self.inner.fetches.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.inner.max_in_flight.load(Ordering::SeqCst)
    }

    fn current(&self, namespace: &str) -> Option<(u64, String)> {
        self.inner.namespaces.lock().get(namespace).cloned()
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

struct InFlight<'a>(&'a Inner);

impl<'a> InFlight<'a> {
    fn enter(inner: &'a Inner) -> Self {
        let now = inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        inner.max_in_flight.fetch_max(now, Ordering::SeqCst);
        Self(inner)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConfigGateway for MockGateway {
    async fn fetch_config(&self, namespace: &str) -> Result<RemoteConfig> {
        self.inner.fetches.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.inner.fail_fetches) {
            return Err(ConfigError::TransportError("injected fetch failure".to_string()));
        }
        match self.current(namespace) {
            Some((version, content)) => Ok(RemoteConfig::new(content, version.to_string())),
            None => Err(ConfigError::NotFoundError(namespace.to_string())),
        }
    }

    async fn await_change(
        &self,
        namespace: &str,
        since: &ChangeToken,
        timeout: Duration,
    ) -> Result<ChangeToken> {
        self.inner.polls.fetch_add(1, Ordering::SeqCst);
        let _guard = InFlight::enter(&self.inner);
        if Self::take_failure(&self.inner.fail_polls) {
            return Err(ConfigError::TransportError("injected poll failure".to_string()));
        }

        let deadline = Instant::now() + timeout;
        let mut rx = self.inner.version.subscribe();
        loop {
            let Some((version, _)) = self.current(namespace) else {
                return Err(ConfigError::NotFoundError(namespace.to_string()));
            };
            let token = ChangeToken::new(version.to_string());
            if &token != since {
                return Ok(token);
            }
            match timeout_at(deadline, rx.changed()).await {
                Ok(Ok(())) => continue,
                Ok(Err(_)) | Err(_) => return Ok(since.clone()),
            }
        }
    }

    fn name(&self) -> String {
        "mock".to_string()
    }
}

/// Listener that records every event it receives.
#[derive(Default)]
pub struct Recorder {
    events: Mutex<Vec<ConfigChangeEvent>>,
}

impl Recorder {
    pub fn events(&self) -> Vec<ConfigChangeEvent> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }
}

impl ConfigurationListener for Recorder {
    fn process(&self, event: &ConfigChangeEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Client with short poll and backoff intervals.
pub fn client(gateway: &MockGateway) -> ConfigClient {
    ConfigClient::builder()
        .with_gateway(gateway.clone())
        .with_poll_timeout(Duration::from_millis(200))
        .with_backoff(BackoffConfig {
            base_ms: 10,
            max_ms: 50,
            factor: 2.0,
            recovery_interval: 1,
        })
        .build()
        .unwrap()
}

/// Poll `condition` until it holds or five seconds pass.
pub async fn eventually<F: Fn() -> bool>(condition: F) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        sleep(Duration::from_millis(10)).await;
    }
    condition()
}
