// REST API response types
//
// Wire models for the SimpliSafe REST API. Field presence differs between
// V2 and V3 base stations, so optional fields use `#[serde(default)]`
// liberally and unmodelled fields land in `extra`.

use serde::{Deserialize, Deserializer, Serialize};

// ── Auth check ───────────────────────────────────────────────────────

/// Body of `GET api/authCheck`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthCheck {
    pub user_id: u64,
    #[serde(default)]
    pub is_admin: bool,
}

// ── Subscriptions ────────────────────────────────────────────────────

/// Body of `GET users/{uid}/subscriptions`.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionList {
    #[serde(default)]
    pub subscriptions: Vec<RawSubscription>,
}

/// One monitored location and its base station.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSubscription {
    pub sid: u64,
    #[serde(default)]
    pub uid: Option<u64>,
    /// Non-zero once the subscription has been cancelled.
    #[serde(default)]
    pub canceled: u64,
    pub location: RawLocation,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl RawSubscription {
    pub fn is_active(&self) -> bool {
        self.canceled == 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLocation {
    #[serde(default)]
    pub street1: Option<String>,
    #[serde(default)]
    pub street2: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub zip: Option<String>,
    pub system: RawSystem,
}

/// The `location.system` block.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSystem {
    #[serde(default)]
    pub serial: Option<String>,
    /// 2 or 3. Absent for locations without a provisioned base station.
    #[serde(default)]
    pub version: Option<u8>,
    /// Vendor state string, e.g. `"OFF"`, `"HOME_COUNT"`.
    #[serde(default)]
    pub alarm_state: Option<String>,
    #[serde(default)]
    pub is_alarming: bool,
    #[serde(default)]
    pub conn_type: Option<String>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub is_offline: bool,
    #[serde(default)]
    pub cameras: Vec<RawCamera>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCamera {
    pub uuid: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub camera_settings: Option<RawCameraSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCameraSettings {
    #[serde(default)]
    pub camera_name: Option<String>,
}

// ── Sensors ──────────────────────────────────────────────────────────

/// Sensor payload, tagged by the base-station generation it came from.
#[derive(Debug, Clone)]
pub enum SensorPayload {
    V2(RawSensorV2),
    V3(RawSensorV3),
}

impl SensorPayload {
    pub fn serial(&self) -> &str {
        match self {
            Self::V2(s) => &s.serial,
            Self::V3(s) => &s.serial,
        }
    }
}

/// Body of `GET ss3/subscriptions/{sid}/sensors`.
#[derive(Debug, Clone, Deserialize)]
pub struct SensorListV3 {
    #[serde(default)]
    pub sensors: Vec<RawSensorV3>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSensorV3 {
    #[serde(rename = "type")]
    pub sensor_type: u16,
    pub serial: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: RawSensorStatus,
    #[serde(default)]
    pub flags: RawSensorFlags,
    #[serde(default)]
    pub setting: serde_json::Value,
}

/// `status` block of a V3 sensor. Locks fill the `lock*` fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSensorStatus {
    #[serde(default)]
    pub triggered: Option<bool>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub malfunction: Option<bool>,
    /// 1 = locked, 2 = unlocked.
    #[serde(default)]
    pub lock_state: Option<u8>,
    #[serde(default, deserialize_with = "loose_bool")]
    pub lock_jam_state: bool,
    #[serde(default)]
    pub lock_disabled: Option<bool>,
    #[serde(default)]
    pub lock_low_battery: Option<bool>,
    #[serde(default)]
    pub pin_pad_low_battery: Option<bool>,
    #[serde(default)]
    pub pin_pad_offline: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSensorFlags {
    #[serde(default)]
    pub low_battery: bool,
    #[serde(default)]
    pub offline: bool,
}

/// Body of `GET subscriptions/{sid}/settings`. V2 stations report a fixed
/// number of sensor slots; unused ones are empty objects.
#[derive(Debug, Clone, Deserialize)]
pub struct SettingsV2 {
    pub settings: SettingsV2Inner,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SettingsV2Inner {
    #[serde(default)]
    pub sensors: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSensorV2 {
    #[serde(rename = "type")]
    pub sensor_type: u16,
    pub serial: String,
    #[serde(default)]
    pub name: String,
    /// Raw sensor reading; `"triggered"` for tripped entry/motion sensors.
    #[serde(default)]
    pub sensor_status: Option<serde_json::Value>,
    #[serde(default)]
    pub sensor_data: Option<serde_json::Value>,
    /// `"ok"` or `"low"`.
    #[serde(default)]
    pub battery: Option<String>,
    #[serde(default)]
    pub error: Option<bool>,
    #[serde(default)]
    pub setting: Option<u32>,
}

// ── Commands ─────────────────────────────────────────────────────────

/// Alarm states that can be requested. The vendor path segment / query
/// value is the lowercase name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettableAlarmState {
    Off,
    Home,
    Away,
}

impl SettableAlarmState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Home => "home",
            Self::Away => "away",
        }
    }
}

impl std::fmt::Display for SettableAlarmState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lock actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockAction {
    Lock,
    Unlock,
}

impl LockAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lock => "lock",
            Self::Unlock => "unlock",
        }
    }
}

/// Acknowledgement for a state-changing request.
///
/// Returned once the vendor has accepted the command; the reported state
/// catches up later through a refresh or an event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandAck {
    #[serde(default = "accepted_by_default")]
    pub success: bool,
    #[serde(default)]
    pub reason: Option<String>,
    /// State echoed by the vendor (`state` on V3 and locks,
    /// `requestedState` on V2).
    #[serde(default, alias = "requestedState")]
    pub state: Option<serde_json::Value>,
    #[serde(skip)]
    pub http_status: u16,
}

impl CommandAck {
    pub(crate) fn accepted() -> Self {
        Self {
            success: true,
            reason: None,
            state: None,
            http_status: 200,
        }
    }

    /// Turn `success: false` into [`Error::CommandRejected`].
    ///
    /// [`Error::CommandRejected`]: crate::Error::CommandRejected
    pub(crate) fn into_result(mut self, status: u16) -> Result<Self, crate::Error> {
        self.http_status = status;
        if self.success {
            Ok(self)
        } else {
            Err(crate::Error::CommandRejected {
                status,
                message: self
                    .reason
                    .unwrap_or_else(|| "command rejected without a reason".into()),
            })
        }
    }
}

fn accepted_by_default() -> bool {
    true
}

// ── Events ───────────────────────────────────────────────────────────

/// Body of `GET subscriptions/{sid}/events`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventList {
    #[serde(default)]
    pub num_events: Option<u32>,
    #[serde(default)]
    pub last_event_timestamp: Option<i64>,
    #[serde(default)]
    pub events: Vec<RawEvent>,
}

/// One vendor event, as delivered by both the poll endpoint and the
/// push channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    pub event_id: u64,
    /// Seconds since the epoch.
    pub event_timestamp: i64,
    /// Contact-ID code identifying the event kind.
    pub event_cid: u16,
    pub sid: u64,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub sensor_serial: Option<String>,
    #[serde(default)]
    pub sensor_type: Option<u16>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub sensor_name: Option<String>,
    #[serde(default)]
    pub info: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// ── Helpers ──────────────────────────────────────────────────────────

fn empty_as_none<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}

/// Accepts `true`/`false` as well as `0`/`1` (the vendor mixes both).
fn loose_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Bool(b) => b,
        serde_json::Value::Number(n) => n.as_i64().is_some_and(|n| n != 0),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn raw_event_treats_empty_serial_as_none() {
        let event: RawEvent = serde_json::from_value(json!({
            "eventId": 42,
            "eventTimestamp": 1_700_000_000,
            "eventCid": 3441,
            "sid": 12345,
            "sensorSerial": "",
            "sensorType": 1,
            "sensorName": "",
            "info": "System Armed (Home) by Keypad",
            "accountId": "abc"
        }))
        .unwrap();

        assert_eq!(event.event_id, 42);
        assert!(event.sensor_serial.is_none());
        assert!(event.sensor_name.is_none());
        assert_eq!(event.extra["accountId"], "abc");
    }

    #[test]
    fn lock_jam_state_accepts_numbers() {
        let status: RawSensorStatus =
            serde_json::from_value(json!({ "lockState": 1, "lockJamState": 1 })).unwrap();
        assert!(status.lock_jam_state);
        assert_eq!(status.lock_state, Some(1));
    }

    #[test]
    fn command_ack_defaults_to_success() {
        let ack: CommandAck = serde_json::from_value(json!({ "state": "lock" })).unwrap();
        assert!(ack.success);
        assert!(ack.into_result(200).is_ok());
    }

    #[test]
    fn command_ack_failure_is_rejection() {
        let ack: CommandAck =
            serde_json::from_value(json!({ "success": false, "reason": "sensor open" })).unwrap();
        let err = ack.into_result(200).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::CommandRejected { ref message, .. } if message == "sensor open"
        ));
    }

    #[test]
    fn subscription_without_version_parses() {
        let sub: RawSubscription = serde_json::from_value(json!({
            "sid": 1,
            "location": { "system": { "alarmState": "OFF" } }
        }))
        .unwrap();
        assert!(sub.location.system.version.is_none());
        assert!(sub.is_active());
    }
}
