//! Key-level diff between two flat configuration maps.

use std::collections::BTreeMap;
use std::fmt;

/// Kind of change observed for a single key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// The key did not exist before.
    Add,
    /// The key existed with a different value.
    Update,
    /// The key no longer exists.
    Delete,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Add => "ADD",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

/// A change to one key of one namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigChangeEvent {
    /// Namespace the key belongs to.
    pub namespace: String,
    /// The changed key.
    pub key: String,
    /// What happened to the key.
    pub kind: ChangeKind,
    /// Value after the change; `None` for deletions.
    pub new_value: Option<String>,
}

impl ConfigChangeEvent {
    fn upsert(namespace: &str, key: &str, kind: ChangeKind, value: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            key: key.to_string(),
            kind,
            new_value: Some(value.to_string()),
        }
    }

    fn delete(namespace: &str, key: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            key: key.to_string(),
            kind: ChangeKind::Delete,
            new_value: None,
        }
    }
}

impl fmt::Display for ConfigChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.new_value {
            Some(value) => write!(f, "{} {}/{}={}", self.kind, self.namespace, self.key, value),
            None => write!(f, "{} {}/{}", self.kind, self.namespace, self.key),
        }
    }
}

/// Compute one event per changed key between `old` and `new`.
///
/// Additions and updates come first in key order, then deletions in key
/// order. Unchanged keys produce nothing.
///
/// # Examples
///
/// ```rust
/// use remote_config_watch::core::{ChangeKind, diff_snapshots};
/// use std::collections::BTreeMap;
///
/// let old = BTreeMap::from([("a".to_string(), "1".to_string())]);
/// let new = BTreeMap::from([("a".to_string(), "2".to_string())]);
///
/// let events = diff_snapshots("app", &old, &new);
/// assert_eq!(events.len(), 1);
/// assert_eq!(events[0].kind, ChangeKind::Update);
/// ```
pub fn diff_snapshots(
    namespace: &str,
    old: &BTreeMap<String, String>,
    new: &BTreeMap<String, String>,
) -> Vec<ConfigChangeEvent> {
    let mut events = Vec::new();

    for (key, value) in new {
        match old.get(key) {
            None => events.push(ConfigChangeEvent::upsert(namespace, key, ChangeKind::Add, value)),
            Some(previous) if previous != value => {
                events.push(ConfigChangeEvent::upsert(namespace, key, ChangeKind::Update, value))
            }
            Some(_) => {}
        }
    }

    for key in old.keys() {
        if !new.contains_key(key) {
            events.push(ConfigChangeEvent::delete(namespace, key));
        }
    }

    events
}
