//! Per-namespace snapshot cache with atomic replacement.

use arc_swap::ArcSwap;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Opaque version marker handed out by the remote service.
///
/// Tokens are only ever compared for equality; their ordering is the
/// remote service's business.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ChangeToken(String);

impl ChangeToken {
    /// Create a token from its wire representation.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The wire representation of this token.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChangeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChangeToken {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}

impl From<String> for ChangeToken {
    fn from(token: String) -> Self {
        Self(token)
    }
}

/// The last known state of one namespace.
///
/// Snapshots are immutable once published; a refresh replaces the whole
/// snapshot rather than editing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSnapshot {
    namespace: String,
    raw: String,
    content: BTreeMap<String, String>,
    change_token: ChangeToken,
}

impl ConfigSnapshot {
    /// Create a snapshot from raw content and its parsed flat map.
    pub fn new(
        namespace: impl Into<String>,
        raw: impl Into<String>,
        content: BTreeMap<String, String>,
        change_token: ChangeToken,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            raw: raw.into(),
            content,
            change_token,
        }
    }

    /// Namespace this snapshot belongs to.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Raw content as returned by the gateway.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Flat key/value view of the content, ordered by key.
    pub fn content(&self) -> &BTreeMap<String, String> {
        &self.content
    }

    /// Look up a single key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.content.get(key).map(String::as_str)
    }

    /// Version marker this snapshot was fetched at.
    pub fn change_token(&self) -> &ChangeToken {
        &self.change_token
    }
}

/// Cache of the latest snapshot per namespace.
///
/// Each namespace owns its own `ArcSwap` cell, so replacing one namespace's
/// snapshot never blocks readers of another, and a reader always sees
/// either the old or the new snapshot in full.
///
/// There is no implicit eviction: entries live as long as the cache.
#[derive(Default)]
pub struct SnapshotCache {
    entries: DashMap<String, Arc<ArcSwap<ConfigSnapshot>>>,
}

impl SnapshotCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot for `namespace`, if one has been fetched.
    pub fn get(&self, namespace: &str) -> Option<Arc<ConfigSnapshot>> {
        let cell = self.entries.get(namespace).map(|entry| Arc::clone(entry.value()))?;
        Some(cell.load_full())
    }

    /// Replace the snapshot for its namespace.
    pub fn put(&self, snapshot: ConfigSnapshot) -> Arc<ConfigSnapshot> {
        let snapshot = Arc::new(snapshot);
        match self.entries.entry(snapshot.namespace().to_string()) {
            Entry::Occupied(entry) => entry.get().store(Arc::clone(&snapshot)),
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(ArcSwap::new(Arc::clone(&snapshot))));
            }
        }
        snapshot
    }

    /// Store `snapshot` only if its namespace has no entry yet.
    ///
    /// Returns whichever snapshot is cached afterwards. A snapshot published
    /// by the poll loop is never overwritten by an on-demand fetch.
    pub fn put_if_absent(&self, snapshot: ConfigSnapshot) -> Arc<ConfigSnapshot> {
        match self.entries.entry(snapshot.namespace().to_string()) {
            Entry::Occupied(entry) => entry.get().load_full(),
            Entry::Vacant(entry) => {
                let snapshot = Arc::new(snapshot);
                entry.insert(Arc::new(ArcSwap::new(Arc::clone(&snapshot))));
                snapshot
            }
        }
    }

    /// Number of cached namespaces.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no namespace has been cached yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(ns: &str, token: &str, pairs: &[(&str, &str)]) -> ConfigSnapshot {
        let content = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ConfigSnapshot::new(ns, "", content, ChangeToken::from(token))
    }

    #[test]
    fn test_get_missing() {
        let cache = SnapshotCache::new();
        assert!(cache.get("app").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_put_replaces() {
        let cache = SnapshotCache::new();
        cache.put(snapshot("app", "T1", &[("a", "1")]));
        cache.put(snapshot("app", "T2", &[("a", "2")]));

        let current = cache.get("app").unwrap();
        assert_eq!(current.change_token().as_str(), "T2");
        assert_eq!(current.get("a"), Some("2"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_put_if_absent_keeps_existing() {
        let cache = SnapshotCache::new();
        cache.put(snapshot("app", "T2", &[("a", "2")]));

        let kept = cache.put_if_absent(snapshot("app", "T1", &[("a", "1")]));
        assert_eq!(kept.change_token().as_str(), "T2");

        let inserted = cache.put_if_absent(snapshot("other", "T1", &[]));
        assert_eq!(inserted.namespace(), "other");
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_readers_keep_old_snapshot() {
        let cache = SnapshotCache::new();
        cache.put(snapshot("app", "T1", &[("a", "1")]));
        let held = cache.get("app").unwrap();

        cache.put(snapshot("app", "T2", &[("a", "2")]));

        assert_eq!(held.get("a"), Some("1"));
        assert_eq!(cache.get("app").unwrap().get("a"), Some("2"));
    }
}
