// ── System domain types ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::error;

use super::ids::SystemId;

/// Base station generation. The REST paths differ between the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
pub enum SystemVersion {
    #[strum(serialize = "v2")]
    V2,
    #[strum(serialize = "v3")]
    V3,
}

impl SystemVersion {
    /// Numeric version as the vendor reports it. Anything other than 2 is
    /// treated as the current generation.
    pub fn from_vendor(version: u8) -> Self {
        if version == 2 { Self::V2 } else { Self::V3 }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Self::V2 => 2,
            Self::V3 => 3,
        }
    }
}

/// Alarm state as reported by the base station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[non_exhaustive]
pub enum AlarmState {
    Off,
    Home,
    Away,
    /// Alarm is sounding (or counting down to sound).
    Alarming,
    EntryDelay,
    /// Arming countdown before `Home` or `Away` takes effect.
    ExitDelay,
    Error,
    Unknown,
}

impl AlarmState {
    /// Parse the vendor's `alarmState` vocabulary. Unrecognised values are
    /// logged and become `Unknown`.
    pub fn from_vendor(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "OFF" => Self::Off,
            "HOME" => Self::Home,
            "AWAY" => Self::Away,
            "ALARM" | "ALARM_COUNT" => Self::Alarming,
            "ENTRY_DELAY" => Self::EntryDelay,
            "EXIT_DELAY" | "HOME_COUNT" | "AWAY_COUNT" => Self::ExitDelay,
            "ERROR" => Self::Error,
            _ => {
                error!(state = raw, "unknown system state");
                Self::Unknown
            }
        }
    }

    /// Whether the system is armed in any mode.
    pub fn is_armed(self) -> bool {
        matches!(self, Self::Home | Self::Away | Self::ExitDelay | Self::EntryDelay)
    }

    /// States a client may request.
    pub fn is_settable(self) -> bool {
        matches!(self, Self::Off | Self::Home | Self::Away)
    }
}

/// Street address of the monitored location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub street1: Option<String>,
    pub street2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
}

/// A camera attached to a system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub uuid: String,
    pub name: Option<String>,
    pub model: Option<String>,
    pub online: bool,
}

/// One monitored location and its base station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct System {
    pub id: SystemId,
    pub version: SystemVersion,
    pub alarm_state: AlarmState,
    pub is_alarming: bool,
    pub serial: Option<String>,
    pub connection_type: Option<String>,
    pub temperature: Option<f64>,
    pub address: Address,
    pub active: bool,
    pub offline: bool,
    pub cameras: Vec<Camera>,

    /// State requested by this client and not yet confirmed by an event
    /// or a refresh.
    pub pending_state: Option<AlarmState>,
    /// Set when an event changed this system since the last full refresh.
    pub stale: bool,
    pub last_updated: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vendor_states_parse() {
        assert_eq!(AlarmState::from_vendor("OFF"), AlarmState::Off);
        assert_eq!(AlarmState::from_vendor("away"), AlarmState::Away);
        assert_eq!(AlarmState::from_vendor("ALARM_COUNT"), AlarmState::Alarming);
        assert_eq!(AlarmState::from_vendor("HOME_COUNT"), AlarmState::ExitDelay);
        assert_eq!(AlarmState::from_vendor("SOMETHING_NEW"), AlarmState::Unknown);
    }

    #[test]
    fn only_off_home_away_are_settable() {
        assert!(AlarmState::Away.is_settable());
        assert!(!AlarmState::Alarming.is_settable());
        assert!(!AlarmState::Unknown.is_settable());
    }

    #[test]
    fn version_two_is_legacy() {
        assert_eq!(SystemVersion::from_vendor(2), SystemVersion::V2);
        assert_eq!(SystemVersion::from_vendor(3), SystemVersion::V3);
        assert_eq!(SystemVersion::V3.as_u8(), 3);
    }
}
