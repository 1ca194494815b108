// PIN endpoints
//
// The vendor only accepts the whole PIN table at once, so reads and writes
// both work on a label -> PIN map with `master` and `duress` first.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::error::Error;
use crate::executor::ApiRequest;
use crate::rest::SimpliSafeClient;
use crate::rest::models::CommandAck;

pub const MASTER_PIN: &str = "master";
pub const DURESS_PIN: &str = "duress";
pub const RESERVED_PIN_LABELS: [&str; 2] = [MASTER_PIN, DURESS_PIN];
pub const MAX_USER_PINS: usize = 4;

// ── Wire formats ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct PinsV3Envelope {
    pins: PinsV3,
}

#[derive(Debug, Deserialize)]
struct PinsV3 {
    master: PinV3,
    duress: PinV3,
    #[serde(default)]
    users: UsersV3,
}

#[derive(Debug, Deserialize)]
struct PinV3 {
    #[serde(default)]
    pin: String,
    #[serde(default)]
    name: String,
}

/// V3 user slots come back either as a list or as a `"0".."3"` map.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum UsersV3 {
    List(Vec<PinV3>),
    Map(BTreeMap<String, PinV3>),
}

impl Default for UsersV3 {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

#[derive(Debug, Deserialize)]
struct PinsV2Envelope {
    pins: BTreeMap<String, PinV2>,
}

#[derive(Debug, Deserialize)]
struct PinV2 {
    #[serde(default)]
    value: String,
    #[serde(default)]
    name: String,
}

// ── Endpoints ────────────────────────────────────────────────────────

impl SimpliSafeClient {
    /// Read every set PIN, keyed by label. `master` and `duress` come first;
    /// empty user slots are omitted.
    pub async fn pins(&self, system_id: u64, version: u8) -> Result<IndexMap<String, String>, Error> {
        if version == 2 {
            let env: PinsV2Envelope = self
                .fetch(
                    ApiRequest::get(format!("subscriptions/{system_id}/pins"))
                        .query("settingsType", "all")
                        .query("cached", false),
                )
                .await?;
            pins_from_v2(env)
        } else {
            let env: PinsV3Envelope = self
                .fetch(ApiRequest::get(format!("ss3/subscriptions/{system_id}/settings/pins")))
                .await?;
            Ok(pins_from_v3(env))
        }
    }

    /// Replace the PIN table. `pins` must contain `master` and `duress`.
    pub async fn set_pins(
        &self,
        system_id: u64,
        version: u8,
        pins: &IndexMap<String, String>,
    ) -> Result<CommandAck, Error> {
        let payload = pin_payload(pins, version)?;
        let request = if version == 2 {
            ApiRequest::post(format!("subscriptions/{system_id}/pins"))
        } else {
            ApiRequest::post(format!("ss3/subscriptions/{system_id}/settings/pins"))
        };
        self.command(request.json(payload)).await
    }
}

// ── Conversions ──────────────────────────────────────────────────────

fn pins_from_v3(env: PinsV3Envelope) -> IndexMap<String, String> {
    let mut pins = IndexMap::new();
    pins.insert(MASTER_PIN.to_owned(), env.pins.master.pin);
    pins.insert(DURESS_PIN.to_owned(), env.pins.duress.pin);

    let users: Vec<PinV3> = match env.pins.users {
        UsersV3::List(list) => list,
        UsersV3::Map(map) => map.into_values().collect(),
    };
    for user in users.into_iter().filter(|u| !u.pin.is_empty()) {
        pins.insert(user.name, user.pin);
    }
    pins
}

fn pins_from_v2(mut env: PinsV2Envelope) -> Result<IndexMap<String, String>, Error> {
    let missing = |label: &str| Error::InvalidResponse {
        message: format!("PIN table has no {label} entry"),
        body: String::new(),
    };
    let master = env.pins.remove("pin1").ok_or_else(|| missing("pin1"))?;
    let duress = env.pins.remove(DURESS_PIN).ok_or_else(|| missing(DURESS_PIN))?;

    let mut pins = IndexMap::new();
    pins.insert(MASTER_PIN.to_owned(), master.value);
    pins.insert(DURESS_PIN.to_owned(), duress.value);
    for (_, user) in env.pins.into_iter().filter(|(k, v)| k.starts_with("pin") && !v.value.is_empty()) {
        pins.insert(user.name, user.value);
    }
    Ok(pins)
}

/// Build the full PIN table payload, padding unused user slots.
fn pin_payload(pins: &IndexMap<String, String>, version: u8) -> Result<Value, Error> {
    let reserved = |label: &str| {
        pins.get(label).cloned().ok_or_else(|| {
            Error::UnsupportedOperation(format!("PIN table must include the {label} PIN"))
        })
    };
    let master = reserved(MASTER_PIN)?;
    let duress = reserved(DURESS_PIN)?;
    let users: Vec<(&String, &String)> = pins
        .iter()
        .filter(|(label, _)| !RESERVED_PIN_LABELS.contains(&label.as_str()))
        .collect();

    if version == 2 {
        let mut table = Map::new();
        table.insert(DURESS_PIN.into(), json!({ "value": duress }));
        table.insert("pin1".into(), json!({ "value": master }));
        for slot in 0..MAX_USER_PINS {
            let (name, value) = users
                .get(slot)
                .map_or((String::new(), String::new()), |(n, v)| ((*n).clone(), (*v).clone()));
            table.insert(format!("pin{}", slot + 2), json!({ "name": name, "value": value }));
        }
        Ok(json!({ "pins": table }))
    } else {
        let mut slots = Map::new();
        for slot in 0..MAX_USER_PINS {
            let (name, pin) = users
                .get(slot)
                .map_or((String::new(), String::new()), |(n, v)| ((*n).clone(), (*v).clone()));
            slots.insert(slot.to_string(), json!({ "name": name, "pin": pin }));
        }
        Ok(json!({
            "pins": {
                DURESS_PIN: { "pin": duress },
                MASTER_PIN: { "pin": master },
                "users": slots,
            }
        }))
    }
}
