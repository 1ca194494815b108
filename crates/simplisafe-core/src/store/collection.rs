// ── Generic reactive entity collection ──
//
// Concurrent storage with O(1) lookups and push-based change notification
// via `watch` channels.

use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;

/// A reactive collection for a single entity type.
///
/// Uses `DashMap` for concurrent lookups and a `watch` channel for
/// push-based change notification. Every mutation rebuilds the snapshot
/// subscribers receive; snapshots are ordered by key.
pub(crate) struct EntityCollection<K, T>
where
    K: Clone + Eq + Hash + Ord + Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    by_key: DashMap<K, Arc<T>>,
    snapshot: watch::Sender<Arc<Vec<Arc<T>>>>,
}

impl<K, T> EntityCollection<K, T>
where
    K: Clone + Eq + Hash + Ord + Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    pub(crate) fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            by_key: DashMap::new(),
            snapshot,
        }
    }

    /// Insert or replace an entity. Returns `true` if the key was new.
    pub(crate) fn upsert(&self, key: K, entity: T) -> bool {
        let is_new = self.by_key.insert(key, Arc::new(entity)).is_none();
        self.rebuild_snapshot();
        is_new
    }

    /// Replace the whole collection in one notification.
    pub(crate) fn replace_all(&self, entities: impl IntoIterator<Item = (K, T)>) {
        self.by_key.clear();
        for (key, entity) in entities {
            self.by_key.insert(key, Arc::new(entity));
        }
        self.rebuild_snapshot();
    }

    /// Replace every entity matching `belongs` with `entities`, leaving
    /// the rest untouched.
    pub(crate) fn replace_where(
        &self,
        belongs: impl Fn(&T) -> bool,
        entities: impl IntoIterator<Item = (K, T)>,
    ) {
        self.by_key.retain(|_, v| !belongs(v));
        for (key, entity) in entities {
            self.by_key.insert(key, Arc::new(entity));
        }
        self.rebuild_snapshot();
    }

    /// Apply `f` to a copy of the entity and store the result.
    ///
    /// Returns the updated entity, or `None` if the key is absent.
    pub(crate) fn modify(&self, key: &K, f: impl FnOnce(&mut T)) -> Option<Arc<T>>
    where
        T: Clone,
    {
        let updated = {
            let mut entry = self.by_key.get_mut(key)?;
            let mut value = T::clone(entry.value());
            f(&mut value);
            let updated = Arc::new(value);
            *entry.value_mut() = Arc::clone(&updated);
            updated
        };
        self.rebuild_snapshot();
        Some(updated)
    }

    pub(crate) fn get(&self, key: &K) -> Option<Arc<T>> {
        self.by_key.get(key).map(|r| Arc::clone(r.value()))
    }

    /// Get the current snapshot (cheap `Arc` clone).
    pub(crate) fn snapshot(&self) -> Arc<Vec<Arc<T>>> {
        self.snapshot.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Arc<Vec<Arc<T>>>> {
        self.snapshot.subscribe()
    }

    pub(crate) fn len(&self) -> usize {
        self.by_key.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    // ── Private helpers ──────────────────────────────────────────────

    /// Collect all values in key order and broadcast to subscribers.
    fn rebuild_snapshot(&self) {
        let mut entries: Vec<(K, Arc<T>)> = self
            .by_key
            .iter()
            .map(|r| (r.key().clone(), Arc::clone(r.value())))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        let values: Vec<Arc<T>> = entries.into_iter().map(|(_, v)| v).collect();
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
    }
}
