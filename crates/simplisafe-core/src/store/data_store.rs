// ── Central reactive data store ──
//
// Thread-safe storage for the account's systems and devices. Mutations are
// broadcast to subscribers via `watch` channels.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use super::collection::EntityCollection;
use crate::model::{Device, DeviceId, System, SystemId};
use crate::stream::EntityStream;

/// Reactive cache of everything the account knows about.
///
/// Reads are cheap `Arc` clones; writes take fine-grained per-shard locks
/// inside `DashMap` and never suspend.
pub struct DataStore {
    pub(crate) systems: EntityCollection<SystemId, System>,
    pub(crate) devices: EntityCollection<DeviceId, Device>,
    pub(crate) last_full_refresh: watch::Sender<Option<DateTime<Utc>>>,
    pub(crate) last_event: watch::Sender<Option<DateTime<Utc>>>,
}

impl DataStore {
    pub fn new() -> Self {
        let (last_full_refresh, _) = watch::channel(None);
        let (last_event, _) = watch::channel(None);

        Self {
            systems: EntityCollection::new(),
            devices: EntityCollection::new(),
            last_full_refresh,
            last_event,
        }
    }

    // ── Snapshot accessors ───────────────────────────────────────────

    pub fn systems_snapshot(&self) -> Arc<Vec<Arc<System>>> {
        self.systems.snapshot()
    }

    pub fn devices_snapshot(&self) -> Arc<Vec<Arc<Device>>> {
        self.devices.snapshot()
    }

    // ── Single-entity lookups ────────────────────────────────────────

    pub fn system(&self, id: SystemId) -> Option<Arc<System>> {
        self.systems.get(&id)
    }

    pub fn device(&self, id: &DeviceId) -> Option<Arc<Device>> {
        self.devices.get(id)
    }

    /// Devices attached to one system, in serial order.
    pub fn devices_for(&self, system_id: SystemId) -> Vec<Arc<Device>> {
        self.devices
            .snapshot()
            .iter()
            .filter(|d| d.system_id == system_id)
            .cloned()
            .collect()
    }

    // ── Count accessors ──────────────────────────────────────────────

    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    // ── Subscriptions ────────────────────────────────────────────────

    pub fn subscribe_systems(&self) -> EntityStream<System> {
        EntityStream::new(self.systems.subscribe())
    }

    pub fn subscribe_devices(&self) -> EntityStream<Device> {
        EntityStream::new(self.devices.subscribe())
    }

    // ── Metadata ─────────────────────────────────────────────────────

    pub fn last_full_refresh(&self) -> Option<DateTime<Utc>> {
        *self.last_full_refresh.borrow()
    }

    pub fn last_event(&self) -> Option<DateTime<Utc>> {
        *self.last_event.borrow()
    }

    /// How long ago the last full refresh occurred, or `None` if never refreshed.
    pub fn data_age(&self) -> Option<chrono::Duration> {
        self.last_full_refresh().map(|t| Utc::now() - t)
    }
}

impl Default for DataStore {
    fn default() -> Self {
        Self::new()
    }
}
