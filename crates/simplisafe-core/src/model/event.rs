// ── Event domain types ──
//
// Events are immutable once decoded. The event type comes from the vendor
// CID code; codes this crate does not know still decode, as `Other`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::device::{DeviceType, LockState};
use super::ids::{DeviceId, SystemId};
use super::system::AlarmState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum EventType {
    AlarmTriggered,
    AlarmCanceled,
    ArmedAway,
    ArmedHome,
    Disarmed,
    ExitDelayAway,
    ExitDelayHome,
    Motion,
    Entry,
    Doorbell,
    CameraMotion,
    PowerOutage,
    PowerRestored,
    ConnectionLost,
    ConnectionRestored,
    SensorError,
    SensorRestored,
    AutomaticTest,
    LockLocked,
    LockUnlocked,
    LockJammed,
    Other(u16),
}

impl EventType {
    pub fn from_cid(cid: u16) -> Self {
        match cid {
            1110 | 1120 | 1132 | 1134 | 1154 | 1159 | 1162 => Self::AlarmTriggered,
            1406 => Self::AlarmCanceled,
            3401 | 3407 | 3481 => Self::ArmedAway,
            3441 | 3487 | 3491 => Self::ArmedHome,
            1400 | 1407 => Self::Disarmed,
            9401 | 9407 | 9481 => Self::ExitDelayAway,
            9441 | 9491 => Self::ExitDelayHome,
            1409 => Self::Motion,
            1429 => Self::Entry,
            1458 => Self::Doorbell,
            1170 => Self::CameraMotion,
            1301 => Self::PowerOutage,
            3301 => Self::PowerRestored,
            1350 => Self::ConnectionLost,
            3350 => Self::ConnectionRestored,
            1381 => Self::SensorError,
            3381 => Self::SensorRestored,
            1602 => Self::AutomaticTest,
            9701 => Self::LockLocked,
            9700 => Self::LockUnlocked,
            9703 => Self::LockJammed,
            other => Self::Other(other),
        }
    }

    /// Alarm state the system is in after this event, if the event says.
    pub fn implied_alarm_state(self) -> Option<AlarmState> {
        match self {
            Self::AlarmTriggered => Some(AlarmState::Alarming),
            Self::ArmedAway => Some(AlarmState::Away),
            Self::ArmedHome => Some(AlarmState::Home),
            Self::Disarmed | Self::AlarmCanceled => Some(AlarmState::Off),
            Self::ExitDelayAway | Self::ExitDelayHome => Some(AlarmState::ExitDelay),
            _ => None,
        }
    }

    /// Lock state the originating lock is in after this event.
    pub fn implied_lock_state(self) -> Option<LockState> {
        match self {
            Self::LockLocked => Some(LockState::Locked),
            Self::LockUnlocked => Some(LockState::Unlocked),
            Self::LockJammed => Some(LockState::Jammed),
            _ => None,
        }
    }
}

/// One decoded vendor event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_id: u64,
    pub system_id: SystemId,
    pub device_id: Option<DeviceId>,
    pub event_type: EventType,
    pub cid: u16,
    pub timestamp: DateTime<Utc>,
    pub info: Option<String>,
    pub sensor_name: Option<String>,
    pub sensor_type: Option<DeviceType>,
    /// The vendor payload as received.
    pub payload: serde_json::Value,
}

/// What listeners and `Account::events()` receivers are handed.
#[derive(Debug, Clone)]
pub enum Notification {
    /// A new, never-before-delivered event.
    Event(Arc<Event>),
    /// The subscriber reconnected and re-read the account; cached state is
    /// current again and `backfilled` missed events were delivered.
    Resynced {
        at: DateTime<Utc>,
        backfilled: usize,
    },
}

impl Notification {
    pub fn as_event(&self) -> Option<&Arc<Event>> {
        match self {
            Self::Event(event) => Some(event),
            Self::Resynced { .. } => None,
        }
    }
}
