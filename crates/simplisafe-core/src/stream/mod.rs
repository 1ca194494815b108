//! Live views over the account cache.
//!
//! Each write to a cached collection republishes the whole collection as an
//! immutable [`Snapshot`]. An [`EntityStream`] holds on to the last snapshot
//! it handed out, so a caller keeps a stable view while newer data lands.

use std::sync::Arc;

use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

/// An immutable copy of one cached collection.
pub type Snapshot<T> = Arc<Vec<Arc<T>>>;

/// Subscription to the cached systems or devices.
pub struct EntityStream<T> {
    held: Snapshot<T>,
    updates: watch::Receiver<Snapshot<T>>,
}

impl<T: Send + Sync + 'static> EntityStream<T> {
    pub(crate) fn new(mut updates: watch::Receiver<Snapshot<T>>) -> Self {
        let held = Arc::clone(&updates.borrow_and_update());
        Self { held, updates }
    }

    /// The snapshot held by this view: the one at creation, or the one the
    /// last [`changed`](Self::changed) returned.
    pub fn current(&self) -> &Snapshot<T> {
        &self.held
    }

    /// The newest published snapshot, without moving the held one.
    pub fn latest(&self) -> Snapshot<T> {
        Arc::clone(&self.updates.borrow())
    }

    /// Whether a snapshot newer than the held one is waiting.
    pub fn has_changed(&self) -> bool {
        self.updates.has_changed().unwrap_or(false)
    }

    /// First entity in the held snapshot matching `predicate`.
    pub fn find(&self, predicate: impl Fn(&T) -> bool) -> Option<Arc<T>> {
        self.held.iter().find(|entity| predicate(entity)).cloned()
    }

    /// Wait for the next publish and hold it. `None` once the store is gone.
    pub async fn changed(&mut self) -> Option<Snapshot<T>> {
        self.updates.changed().await.ok()?;
        self.held = Arc::clone(&self.updates.borrow_and_update());
        Some(Arc::clone(&self.held))
    }

    /// Snapshots published after the held one, as a `Stream`.
    pub fn into_stream(self) -> WatchStream<Snapshot<T>> {
        WatchStream::from_changes(self.updates)
    }
}
