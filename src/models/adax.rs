//! Models for the Adax client API (`/auth/token`, `/rest/v1/content/`, `/rest/v1/control/`).
//!
//! Notes
//! - Temperatures travel as integer hundredths of a degree Celsius.
//! - The control endpoint wants `targetTemperature` as a string-encoded integer.
//! - Unknown fields in responses are ignored.

use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub i64);

impl core::fmt::Display for RoomId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// One heater room as reported by the content endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    #[serde(default)]
    pub zone_name: String,
    /// Measured temperature, hundredths of °C.
    pub temperature: i64,
    /// Requested temperature, hundredths of °C.
    #[serde(default)]
    pub target_temperature: i64,
    pub heating_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ContentResponse {
    pub rooms: Vec<Room>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControlRequest {
    pub rooms: Vec<ControlRoom>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlRoom {
    pub id: RoomId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heating_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_temperature: Option<String>,
}

impl ControlRequest {
    pub fn single(room: ControlRoom) -> Self {
        ControlRequest { rooms: vec![room] }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HvacMode {
    Heat,
    Off,
}

impl core::str::FromStr for HvacMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "heat" | "on" => Ok(HvacMode::Heat),
            "off" => Ok(HvacMode::Off),
            other => Err(format!("unknown hvac mode: {}", other)),
        }
    }
}

/// What the heater is doing right now, as far as the cloud tells us.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HvacAction {
    Heating,
    Idle,
}
