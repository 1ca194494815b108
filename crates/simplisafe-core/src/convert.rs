// ── API-to-domain type conversions ──
//
// Bridges raw `simplisafe_api` payloads into canonical `model` types.
// Conversions normalise vendor codes into enums and stamp `last_updated`
// with the caller's clock reading so a whole refresh shares one instant.

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::warn;

use simplisafe_api::models::{
    RawCamera, RawEvent, RawSensorV2, RawSensorV3, RawSubscription, SensorPayload,
};

use crate::error::CoreError;
use crate::model::{
    Address, AlarmState, Camera, Device, DeviceId, DeviceType, Event, EventType, LockState,
    ReportedState, System, SystemId, SystemVersion,
};

// ── System ─────────────────────────────────────────────────────────

/// Convert one subscription into a `System`.
///
/// A subscription without a system version has no base station and is a
/// vendor contract violation at this point.
pub(crate) fn system_from_subscription(
    sub: RawSubscription,
    now: DateTime<Utc>,
) -> Result<System, CoreError> {
    let active = sub.is_active();
    let location = sub.location;
    let raw = location.system;

    let version = raw.version.ok_or_else(|| CoreError::InvalidResponse {
        message: format!("subscription {} has no system version", sub.sid),
    })?;

    let alarm_state = raw
        .alarm_state
        .as_deref()
        .map_or(AlarmState::Unknown, AlarmState::from_vendor);

    Ok(System {
        id: SystemId(sub.sid),
        version: SystemVersion::from_vendor(version),
        alarm_state,
        is_alarming: raw.is_alarming,
        serial: raw.serial,
        connection_type: raw.conn_type,
        temperature: raw.temperature,
        address: Address {
            street1: location.street1,
            street2: location.street2,
            city: location.city,
            state: location.state,
            zip: location.zip,
        },
        active,
        offline: raw.is_offline,
        cameras: raw.cameras.into_iter().map(camera_from_raw).collect(),
        pending_state: None,
        stale: false,
        last_updated: now,
    })
}

fn camera_from_raw(raw: RawCamera) -> Camera {
    let online = raw
        .status
        .as_deref()
        .is_some_and(|s| s.eq_ignore_ascii_case("online"));
    Camera {
        name: raw.camera_settings.and_then(|s| s.camera_name),
        uuid: raw.uuid,
        model: raw.model,
        online,
    }
}

// ── Device ─────────────────────────────────────────────────────────

pub(crate) fn device_from_sensor(
    system_id: SystemId,
    payload: SensorPayload,
    now: DateTime<Utc>,
) -> Device {
    match payload {
        SensorPayload::V3(raw) => device_from_v3(system_id, raw, now),
        SensorPayload::V2(raw) => device_from_v2(system_id, raw, now),
    }
}

fn device_from_v3(system_id: SystemId, raw: RawSensorV3, now: DateTime<Utc>) -> Device {
    let device_type = DeviceType::from_code(raw.sensor_type);
    let status = &raw.status;

    let reported_state = match device_type {
        DeviceType::Lock => ReportedState::Lock {
            state: LockState::from_vendor(status.lock_state, status.lock_jam_state),
            disabled: status.lock_disabled.unwrap_or(false),
            lock_low_battery: status.lock_low_battery.unwrap_or(false),
            pin_pad_low_battery: status.pin_pad_low_battery.unwrap_or(false),
            pin_pad_offline: status.pin_pad_offline.unwrap_or(false),
        },
        DeviceType::Temperature => status
            .temperature
            .map_or(ReportedState::None, |degrees| ReportedState::Temperature { degrees }),
        DeviceType::Camera => ReportedState::Camera {
            online: !raw.flags.offline,
        },
        t if is_tripwire(t) => ReportedState::Sensor {
            triggered: status.triggered.unwrap_or(false),
        },
        _ => ReportedState::None,
    };

    let low_battery = raw.flags.low_battery
        || status.lock_low_battery.unwrap_or(false)
        || status.pin_pad_low_battery.unwrap_or(false);

    Device {
        id: DeviceId::new(raw.serial),
        system_id,
        device_type,
        name: raw.name,
        reported_state,
        low_battery,
        offline: raw.flags.offline,
        last_updated: now,
    }
}

fn device_from_v2(system_id: SystemId, raw: RawSensorV2, now: DateTime<Utc>) -> Device {
    let device_type = DeviceType::from_code(raw.sensor_type);

    let reported_state = match device_type {
        DeviceType::Temperature => raw
            .sensor_data
            .as_ref()
            .and_then(|d| d.get("temperature"))
            .and_then(Value::as_f64)
            .map_or(ReportedState::None, |degrees| ReportedState::Temperature { degrees }),
        t if is_tripwire(t) => ReportedState::Sensor {
            triggered: raw
                .sensor_status
                .as_ref()
                .and_then(Value::as_str)
                .is_some_and(|s| s.eq_ignore_ascii_case("triggered")),
        },
        _ => ReportedState::None,
    };

    Device {
        id: DeviceId::new(raw.serial),
        system_id,
        device_type,
        name: raw.name,
        reported_state,
        low_battery: raw.battery.as_deref() == Some("low"),
        offline: raw.error.unwrap_or(false),
        last_updated: now,
    }
}

/// Device kinds whose state is a single triggered flag.
fn is_tripwire(device_type: DeviceType) -> bool {
    matches!(
        device_type,
        DeviceType::Entry
            | DeviceType::Motion
            | DeviceType::GlassBreak
            | DeviceType::CarbonMonoxide
            | DeviceType::Smoke
            | DeviceType::Leak
            | DeviceType::PanicButton
            | DeviceType::Doorbell
    )
}

// ── Event ──────────────────────────────────────────────────────────

pub(crate) fn event_from_raw(raw: RawEvent) -> Event {
    let timestamp = DateTime::from_timestamp(raw.event_timestamp, 0).unwrap_or_else(|| {
        warn!(event_id = raw.event_id, ts = raw.event_timestamp, "event timestamp out of range");
        Utc::now()
    });
    let payload = serde_json::to_value(&raw).unwrap_or(Value::Null);

    Event {
        event_id: raw.event_id,
        system_id: SystemId(raw.sid),
        device_id: raw.sensor_serial.map(DeviceId::new),
        event_type: EventType::from_cid(raw.event_cid),
        cid: raw.event_cid,
        timestamp,
        info: raw.info,
        sensor_name: raw.sensor_name,
        sensor_type: raw.sensor_type.map(DeviceType::from_code),
        payload,
    }
}
