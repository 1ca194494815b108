// ── Store mutation logic ──
//
// Applies full snapshots, single-system refreshes, live events and pending
// commands to the DataStore.

use chrono::{DateTime, Utc};
use tracing::debug;

use super::DataStore;
use crate::model::{AlarmState, Device, DeviceId, Event, ReportedState, System, SystemId};

impl DataStore {
    /// Replace every system and device with a freshly fetched snapshot.
    ///
    /// Fetched records are stamped with the time their fetch began; cached
    /// state written by a later event is kept over them.
    pub(crate) fn apply_full_snapshot(
        &self,
        systems: Vec<System>,
        devices: Vec<Device>,
        now: DateTime<Utc>,
    ) {
        let systems: Vec<(SystemId, System)> = systems
            .into_iter()
            .map(|s| (s.id, self.merge_fetched_system(s)))
            .collect();
        let devices: Vec<(DeviceId, Device)> = devices
            .into_iter()
            .map(|d| (d.id.clone(), self.merge_fetched_device(d)))
            .collect();
        self.systems.replace_all(systems);
        self.devices.replace_all(devices);
        self.last_full_refresh.send_replace(Some(now));

        debug!(
            systems = self.system_count(),
            devices = self.device_count(),
            "full snapshot applied"
        );
    }

    /// Replace one system and its devices.
    pub(crate) fn apply_system_snapshot(&self, system: System, devices: Vec<Device>) {
        let id = system.id;
        let system = self.merge_fetched_system(system);
        let devices: Vec<(DeviceId, Device)> = devices
            .into_iter()
            .map(|d| (d.id.clone(), self.merge_fetched_device(d)))
            .collect();
        self.systems.upsert(id, system);
        self.devices.replace_where(|d| d.system_id == id, devices);
    }

    /// Record a state change this client requested.
    pub(crate) fn mark_pending(&self, system_id: SystemId, state: AlarmState) -> bool {
        self.systems
            .modify(&system_id, |s| s.pending_state = Some(state))
            .is_some()
    }

    /// Fold a live event into the cache.
    ///
    /// The system is marked stale. Events that imply an alarm or lock state
    /// apply it directly and settle any pending request. Returns `false`
    /// when the event's system is not cached.
    pub(crate) fn apply_event(&self, event: &Event) -> bool {
        self.last_event.send_replace(Some(event.timestamp));

        let implied = event.event_type.implied_alarm_state();
        let known = self
            .systems
            .modify(&event.system_id, |system| {
                system.stale = true;
                system.last_updated = event.timestamp;
                if let Some(state) = implied {
                    system.alarm_state = state;
                    system.is_alarming = state == AlarmState::Alarming;
                    system.pending_state = None;
                }
            })
            .is_some();

        if let (Some(lock), Some(device_id)) =
            (event.event_type.implied_lock_state(), event.device_id.as_ref())
        {
            self.devices.modify(device_id, |device| {
                match &mut device.reported_state {
                    ReportedState::Lock { state, .. } => *state = lock,
                    other => *other = ReportedState::lock(lock),
                }
                device.last_updated = event.timestamp;
            });
        }

        known
    }

    /// Fold a fetched system over its cached copy.
    ///
    /// A pending request survives unless the fetch shows it took effect.
    /// If an event touched the system after the fetch began, its alarm
    /// state and staleness stand.
    fn merge_fetched_system(&self, mut fresh: System) -> System {
        let Some(cached) = self.systems.get(&fresh.id) else {
            return fresh;
        };

        if cached.last_updated > fresh.last_updated {
            debug!(system_id = %fresh.id, "keeping event state newer than fetch");
            fresh.alarm_state = cached.alarm_state;
            fresh.is_alarming = cached.is_alarming;
            fresh.stale = cached.stale;
            fresh.pending_state = cached.pending_state;
            fresh.last_updated = cached.last_updated;
        } else {
            fresh.pending_state = cached
                .pending_state
                .filter(|pending| *pending != fresh.alarm_state);
        }
        fresh
    }

    /// Keep a cached device's reported state when an event set it after
    /// the fetch began.
    fn merge_fetched_device(&self, mut fresh: Device) -> Device {
        if let Some(cached) = self
            .devices
            .get(&fresh.id)
            .filter(|cached| cached.last_updated > fresh.last_updated)
        {
            fresh.reported_state = cached.reported_state.clone();
            fresh.last_updated = cached.last_updated;
        }
        fresh
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{
        Address, DeviceId, DeviceType, EventType, LockState, SystemVersion,
    };

    fn system(id: u64, state: AlarmState) -> System {
        System {
            id: SystemId(id),
            version: SystemVersion::V3,
            alarm_state: state,
            is_alarming: false,
            serial: None,
            connection_type: None,
            temperature: None,
            address: Address::default(),
            active: true,
            offline: false,
            cameras: Vec::new(),
            pending_state: None,
            stale: false,
            last_updated: Utc::now(),
        }
    }

    fn lock(serial: &str, system_id: u64) -> Device {
        Device {
            id: DeviceId::from(serial),
            system_id: SystemId(system_id),
            device_type: DeviceType::Lock,
            name: "Front".into(),
            reported_state: ReportedState::Lock {
                state: LockState::Locked,
                disabled: false,
                lock_low_battery: true,
                pin_pad_low_battery: false,
                pin_pad_offline: true,
            },
            low_battery: false,
            offline: false,
            last_updated: Utc::now(),
        }
    }

    fn event(system_id: u64, cid: u16, serial: Option<&str>) -> Event {
        Event {
            event_id: 1,
            system_id: SystemId(system_id),
            device_id: serial.map(DeviceId::from),
            event_type: EventType::from_cid(cid),
            cid,
            timestamp: Utc::now(),
            info: None,
            sensor_name: None,
            sensor_type: None,
            payload: serde_json::Value::Null,
        }
    }

    #[test]
    fn full_snapshot_sets_refresh_time() {
        let store = DataStore::new();
        assert!(store.data_age().is_none());

        store.apply_full_snapshot(vec![system(1, AlarmState::Off)], vec![lock("l1", 1)], Utc::now());
        assert_eq!(store.system_count(), 1);
        assert_eq!(store.device_count(), 1);
        assert!(store.last_full_refresh().is_some());
    }

    #[test]
    fn arming_event_applies_state_and_clears_pending() {
        let store = DataStore::new();
        store.apply_full_snapshot(vec![system(1, AlarmState::Off)], Vec::new(), Utc::now());
        assert!(store.mark_pending(SystemId(1), AlarmState::Away));

        assert!(store.apply_event(&event(1, 3401, None)));
        let system = store.system(SystemId(1)).unwrap();
        assert_eq!(system.alarm_state, AlarmState::Away);
        assert_eq!(system.pending_state, None);
        assert!(system.stale);
    }

    #[test]
    fn informational_event_only_marks_stale() {
        let store = DataStore::new();
        store.apply_full_snapshot(vec![system(1, AlarmState::Home)], Vec::new(), Utc::now());
        store.mark_pending(SystemId(1), AlarmState::Off);

        store.apply_event(&event(1, 1409, None));
        let system = store.system(SystemId(1)).unwrap();
        assert_eq!(system.alarm_state, AlarmState::Home);
        assert_eq!(system.pending_state, Some(AlarmState::Off));
        assert!(system.stale);
    }

    #[test]
    fn lock_event_updates_device() {
        let store = DataStore::new();
        store.apply_full_snapshot(vec![system(1, AlarmState::Off)], vec![lock("l1", 1)], Utc::now());

        store.apply_event(&event(1, 9700, Some("l1")));
        let device = store.device(&DeviceId::from("l1")).unwrap();
        assert_eq!(device.lock_state(), Some(LockState::Unlocked));

        // Only the lock state moves; the reported flags stay.
        let ReportedState::Lock {
            lock_low_battery,
            pin_pad_offline,
            disabled,
            ..
        } = device.reported_state
        else {
            panic!("expected a lock state, got {:?}", device.reported_state);
        };
        assert!(lock_low_battery);
        assert!(pin_pad_offline);
        assert!(!disabled);
    }

    #[test]
    fn refresh_fetched_before_an_event_keeps_the_event_state() {
        let store = DataStore::new();
        store.apply_full_snapshot(vec![system(1, AlarmState::Off)], vec![lock("l1", 1)], Utc::now());

        let fetch_began = Utc::now();
        let mut armed = event(1, 3401, None);
        armed.timestamp = fetch_began + chrono::Duration::seconds(1);
        store.apply_event(&armed);
        let mut unlocked = event(1, 9700, Some("l1"));
        unlocked.timestamp = fetch_began + chrono::Duration::seconds(1);
        store.apply_event(&unlocked);

        // The fetch started before both events and still reports the old state.
        let older = System {
            last_updated: fetch_began,
            ..system(1, AlarmState::Off)
        };
        let older_lock = Device {
            last_updated: fetch_began,
            ..lock("l1", 1)
        };
        store.apply_full_snapshot(vec![older], vec![older_lock], Utc::now());

        let system = store.system(SystemId(1)).unwrap();
        assert_eq!(system.alarm_state, AlarmState::Away);
        assert!(system.stale);
        let device = store.device(&DeviceId::from("l1")).unwrap();
        assert_eq!(device.lock_state(), Some(LockState::Unlocked));

        // A fetch that began after the events replaces them.
        let newer = System {
            last_updated: fetch_began + chrono::Duration::seconds(2),
            ..self::system(1, AlarmState::Off)
        };
        store.apply_system_snapshot(newer, Vec::new());
        let system = store.system(SystemId(1)).unwrap();
        assert_eq!(system.alarm_state, AlarmState::Off);
        assert!(!system.stale);
    }

    #[test]
    fn event_for_unknown_system_is_reported() {
        let store = DataStore::new();
        assert!(!store.apply_event(&event(9, 1400, None)));
        assert!(store.last_event().is_some());
    }

    #[test]
    fn refresh_keeps_unconfirmed_pending_state() {
        let store = DataStore::new();
        store.apply_full_snapshot(vec![system(1, AlarmState::Off)], Vec::new(), Utc::now());
        store.mark_pending(SystemId(1), AlarmState::Away);

        store.apply_full_snapshot(vec![system(1, AlarmState::Off)], Vec::new(), Utc::now());
        assert_eq!(store.system(SystemId(1)).unwrap().pending_state, Some(AlarmState::Away));

        store.apply_system_snapshot(system(1, AlarmState::Away), Vec::new());
        let system = store.system(SystemId(1)).unwrap();
        assert_eq!(system.pending_state, None);
        assert!(!system.stale);
    }

    #[test]
    fn system_snapshot_replaces_only_its_devices() {
        let store = DataStore::new();
        store.apply_full_snapshot(
            vec![system(1, AlarmState::Off), system(2, AlarmState::Off)],
            vec![lock("a", 1), lock("b", 2)],
            Utc::now(),
        );

        store.apply_system_snapshot(system(1, AlarmState::Off), vec![lock("c", 1)]);
        let serials: Vec<String> = store
            .devices_snapshot()
            .iter()
            .map(|d| d.id.to_string())
            .collect();
        assert_eq!(serials, vec!["b", "c"]);
    }
}
