// ── Identity types ──
//
// Systems are keyed by the vendor subscription id, devices by serial.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ── SystemId ────────────────────────────────────────────────────────

/// Vendor subscription id (`sid`) identifying one base station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SystemId(pub u64);

impl SystemId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for SystemId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl FromStr for SystemId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

// ── DeviceId ────────────────────────────────────────────────────────

/// Device serial number, unique within the account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(serial: impl Into<String>) -> Self {
        Self(serial.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl FromStr for DeviceId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn system_id_parses_and_displays() {
        let id: SystemId = " 12345 ".parse().unwrap();
        assert_eq!(id, SystemId(12345));
        assert_eq!(id.to_string(), "12345");
    }

    #[test]
    fn ids_serialize_transparently() {
        assert_eq!(serde_json::to_string(&SystemId(7)).unwrap(), "7");
        assert_eq!(serde_json::to_string(&DeviceId::from("abc")).unwrap(), "\"abc\"");
    }
}
