//! Listener trait and the per-namespace listener registry.

use crate::core::ConfigChangeEvent;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;
use tokio::sync::futures::Notified;
use tokio::task::JoinHandle;

/// A consumer of configuration change events.
///
/// Listeners are registered per namespace and receive one call per changed
/// key. Identity is the `Arc` allocation: registering the same `Arc` twice
/// for a namespace is a no-op.
///
/// Closures taking `&ConfigChangeEvent` implement this trait.
///
/// # Examples
///
/// ```rust
/// use remote_config_watch::core::ConfigChangeEvent;
/// use remote_config_watch::notify::ConfigurationListener;
/// use std::sync::Arc;
///
/// let listener: Arc<dyn ConfigurationListener> = Arc::new(|event: &ConfigChangeEvent| {
///     println!("{} changed", event.key);
/// });
/// ```
pub trait ConfigurationListener: Send + Sync {
    /// Handle one change event.
    ///
    /// A panic here is caught, logged and reported as a listener fault; it
    /// does not stop delivery to other listeners.
    fn process(&self, event: &ConfigChangeEvent);
}

impl<F> ConfigurationListener for F
where
    F: Fn(&ConfigChangeEvent) + Send + Sync,
{
    fn process(&self, event: &ConfigChangeEvent) {
        self(event)
    }
}

/// One listener's membership in a namespace.
///
/// The `active` flag is cleared on removal. Dispatch checks it right before
/// each delivery, so once `remove` returns the listener only sees an event
/// whose delivery had already passed that check: at most one more call, and
/// only when removal races with an in-flight dispatch.
pub(crate) struct Registration {
    listener: Arc<dyn ConfigurationListener>,
    active: AtomicBool,
}

impl Registration {
    pub(crate) fn new(listener: Arc<dyn ConfigurationListener>) -> Self {
        Self {
            listener,
            active: AtomicBool::new(true),
        }
    }

    pub(crate) fn listener(&self) -> &Arc<dyn ConfigurationListener> {
        &self.listener
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }

    fn is(&self, listener: &Arc<dyn ConfigurationListener>) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.listener), Arc::as_ptr(listener))
    }
}

#[derive(Default)]
struct SlotState {
    registrations: Vec<Arc<Registration>>,
    polling: bool,
    task: Option<JoinHandle<()>>,
}

/// Listener set and poll-loop bookkeeping for a single namespace.
///
/// All mutations for a namespace go through this slot's own lock, so
/// unrelated namespaces never contend.
pub(crate) struct NamespaceSlot {
    namespace: String,
    state: Mutex<SlotState>,
    wake: Notify,
}

impl NamespaceSlot {
    fn new(namespace: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            state: Mutex::new(SlotState::default()),
            wake: Notify::new(),
        }
    }

    pub(crate) fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Copy of the current registrations, safe to iterate without the lock.
    pub(crate) fn registrations(&self) -> Vec<Arc<Registration>> {
        self.state.lock().registrations.clone()
    }

    /// Called by the poll loop at each loop boundary.
    ///
    /// Returns `false` once the namespace has no listeners left, and marks
    /// the loop as stopped in the same critical section so a concurrent
    /// `add` either keeps this loop alive or starts a fresh one, never both.
    pub(crate) fn keep_polling(&self) -> bool {
        let mut state = self.state.lock();
        if state.registrations.is_empty() {
            state.polling = false;
            state.task = None;
            return false;
        }
        true
    }

    /// Resolves when a teardown request wants the loop's attention.
    ///
    /// Wakeups are not stored. Call `enable` on the future before the last
    /// `keep_polling` check, otherwise a removal in between is missed.
    pub(crate) fn woken(&self) -> Notified<'_> {
        self.wake.notified()
    }

    fn is_polling(&self) -> bool {
        self.state.lock().polling
    }

    fn listener_count(&self) -> usize {
        self.state.lock().registrations.len()
    }
}

/// Concurrent mapping from namespace to its listeners.
///
/// Slots are created on first use and retained afterwards, together with
/// the namespace's cached snapshot.
#[derive(Default)]
pub(crate) struct ListenerRegistry {
    slots: DashMap<String, Arc<NamespaceSlot>>,
}

impl ListenerRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn slot(&self, namespace: &str) -> Arc<NamespaceSlot> {
        if let Some(slot) = self.slots.get(namespace) {
            return Arc::clone(slot.value());
        }
        let slot = self
            .slots
            .entry(namespace.to_string())
            .or_insert_with(|| Arc::new(NamespaceSlot::new(namespace)));
        Arc::clone(slot.value())
    }

    fn existing(&self, namespace: &str) -> Option<Arc<NamespaceSlot>> {
        self.slots.get(namespace).map(|slot| Arc::clone(slot.value()))
    }

    /// Register `listener` for `namespace`.
    ///
    /// When the namespace has no running poll loop, `start_loop` is invoked
    /// while the slot is locked and its handle is kept for shutdown.
    /// Returns `false` if this exact listener was already registered.
    pub(crate) fn add<F>(
        &self,
        namespace: &str,
        listener: Arc<dyn ConfigurationListener>,
        start_loop: F,
    ) -> bool
    where
        F: FnOnce(Arc<NamespaceSlot>) -> JoinHandle<()>,
    {
        let slot = self.slot(namespace);
        let mut state = slot.state.lock();
        if state.registrations.iter().any(|r| r.is(&listener)) {
            return false;
        }
        state
            .registrations
            .push(Arc::new(Registration::new(listener)));
        if !state.polling {
            state.polling = true;
            state.task = Some(start_loop(Arc::clone(&slot)));
        }
        true
    }

    /// Unregister `listener` from `namespace`.
    ///
    /// Returns `false` if it was not registered. Removing the last listener
    /// wakes the poll loop so it can notice the teardown request.
    pub(crate) fn remove(&self, namespace: &str, listener: &Arc<dyn ConfigurationListener>) -> bool {
        let Some(slot) = self.existing(namespace) else {
            return false;
        };

        let mut state = slot.state.lock();
        let Some(index) = state.registrations.iter().position(|r| r.is(listener)) else {
            return false;
        };
        let registration = state.registrations.remove(index);
        registration.deactivate();
        let now_empty = state.registrations.is_empty();
        drop(state);

        if now_empty {
            slot.wake.notify_waiters();
        }
        true
    }

    /// Listeners currently registered for `namespace`.
    pub(crate) fn snapshot_listeners(&self, namespace: &str) -> Vec<Arc<dyn ConfigurationListener>> {
        self.existing(namespace)
            .map(|slot| {
                slot.registrations()
                    .iter()
                    .map(|r| Arc::clone(r.listener()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn listener_count(&self, namespace: &str) -> usize {
        self.existing(namespace)
            .map(|slot| slot.listener_count())
            .unwrap_or(0)
    }

    pub(crate) fn is_polling(&self, namespace: &str) -> bool {
        self.existing(namespace)
            .map(|slot| slot.is_polling())
            .unwrap_or(false)
    }

    /// Drop every registration and hand back the poll tasks to await.
    pub(crate) fn drain(&self) -> Vec<JoinHandle<()>> {
        let slots: Vec<Arc<NamespaceSlot>> = self
            .slots
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let mut tasks = Vec::new();
        for slot in slots {
            let mut state = slot.state.lock();
            for registration in state.registrations.drain(..) {
                registration.deactivate();
            }
            if let Some(task) = state.task.take() {
                tasks.push(task);
            }
            drop(state);
            slot.wake.notify_waiters();
        }
        tasks
    }
}
