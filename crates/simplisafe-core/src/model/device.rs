// ── Device domain types ──
//
// Sensors, locks and keypads attached to a base station. The parent system
// is referenced by id only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::error;

use super::ids::{DeviceId, SystemId};

/// Vendor device type, keyed by the numeric code the API reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum DeviceType {
    Remote,
    Keypad,
    Keychain,
    PanicButton,
    Motion,
    Entry,
    GlassBreak,
    CarbonMonoxide,
    Smoke,
    Leak,
    Temperature,
    Camera,
    Siren,
    Doorbell,
    Lock,
    LockKeypad,
    Unknown,
}

impl DeviceType {
    pub fn from_code(code: u16) -> Self {
        match code {
            0 => Self::Remote,
            1 => Self::Keypad,
            2 => Self::Keychain,
            3 => Self::PanicButton,
            4 => Self::Motion,
            5 => Self::Entry,
            6 => Self::GlassBreak,
            7 => Self::CarbonMonoxide,
            8 => Self::Smoke,
            9 => Self::Leak,
            10 => Self::Temperature,
            12 => Self::Camera,
            13 => Self::Siren,
            15 => Self::Doorbell,
            16 => Self::Lock,
            253 => Self::LockKeypad,
            99 => Self::Unknown,
            other => {
                error!(code = other, "unknown device type");
                Self::Unknown
            }
        }
    }

    pub fn code(self) -> u16 {
        match self {
            Self::Remote => 0,
            Self::Keypad => 1,
            Self::Keychain => 2,
            Self::PanicButton => 3,
            Self::Motion => 4,
            Self::Entry => 5,
            Self::GlassBreak => 6,
            Self::CarbonMonoxide => 7,
            Self::Smoke => 8,
            Self::Leak => 9,
            Self::Temperature => 10,
            Self::Camera => 12,
            Self::Siren => 13,
            Self::Doorbell => 15,
            Self::Lock => 16,
            Self::LockKeypad => 253,
            Self::Unknown => 99,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
pub enum LockState {
    Locked,
    Unlocked,
    Jammed,
    Unknown,
}

impl LockState {
    /// Vendor `lockState` is 1 for locked and 2 for unlocked; a jam flag
    /// overrides both.
    pub fn from_vendor(lock_state: Option<u8>, jammed: bool) -> Self {
        if jammed {
            return Self::Jammed;
        }
        match lock_state {
            Some(1) => Self::Locked,
            Some(2) => Self::Unlocked,
            other => {
                error!(?other, "unknown raw lock state");
                Self::Unknown
            }
        }
    }
}

/// What the device last reported, shaped by its kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReportedState {
    Lock {
        state: LockState,
        /// Locked out from remote control at the keypad.
        #[serde(default)]
        disabled: bool,
        #[serde(default)]
        lock_low_battery: bool,
        #[serde(default)]
        pin_pad_low_battery: bool,
        #[serde(default)]
        pin_pad_offline: bool,
    },
    Sensor { triggered: bool },
    Temperature { degrees: f64 },
    Camera { online: bool },
    None,
}

impl ReportedState {
    /// A lock state with no flags raised.
    pub fn lock(state: LockState) -> Self {
        Self::Lock {
            state,
            disabled: false,
            lock_low_battery: false,
            pin_pad_low_battery: false,
            pin_pad_offline: false,
        }
    }
}

/// A sensor, lock or other peripheral.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub system_id: SystemId,
    pub device_type: DeviceType,
    pub name: String,
    pub reported_state: ReportedState,
    pub low_battery: bool,
    pub offline: bool,
    pub last_updated: DateTime<Utc>,
}

impl Device {
    pub fn is_lock(&self) -> bool {
        self.device_type == DeviceType::Lock
    }

    pub fn lock_state(&self) -> Option<LockState> {
        match self.reported_state {
            ReportedState::Lock { state, .. } => Some(state),
            _ => None,
        }
    }
}
