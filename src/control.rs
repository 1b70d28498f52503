//! Control commands for individual rooms.
//!
//! Each command logs in on its own and sends one control POST. Failures are
//! logged and reported as `false`; callers patch the hub themselves on success.

use log::{debug, info};

use crate::client::{AdaxClient, ApiError};
use crate::models::adax::{ControlRequest, ControlRoom, HvacMode, RoomId};
use crate::utils::{ceil_to_whole_degree, celsius_to_hundredths};

/// Target used when heating is switched on: the last requested temperature,
/// or the measured one rounded up to the next whole degree.
pub fn heat_target(requested: Option<f64>, current: i64) -> i64 {
    match requested {
        Some(celsius) => celsius_to_hundredths(celsius),
        None => ceil_to_whole_degree(current),
    }
}

pub struct HeaterControl<'a> {
    client: &'a AdaxClient,
}

impl<'a> HeaterControl<'a> {
    pub fn new(client: &'a AdaxClient) -> Self {
        HeaterControl { client }
    }

    /// Change the target temperature without touching the heating flag.
    pub fn set_temperature(&self, id: RoomId, celsius: f64) -> bool {
        let room = ControlRoom {
            id,
            heating_enabled: None,
            target_temperature: Some(celsius_to_hundredths(celsius).to_string()),
        };
        self.send(room, "set temperature")
    }

    /// Switch heating on or off. `requested` is the last explicitly chosen
    /// target in °C, `current` the measured temperature in hundredths.
    pub fn set_hvac_mode(&self, id: RoomId, mode: HvacMode, requested: Option<f64>, current: i64) -> bool {
        let room = match mode {
            HvacMode::Heat => {
                let target = heat_target(requested, current);
                debug!("Adax: room {} heat target {}", id, target);
                ControlRoom {
                    id,
                    heating_enabled: Some(true),
                    target_temperature: Some(target.to_string()),
                }
            }
            HvacMode::Off => ControlRoom {
                id,
                heating_enabled: Some(false),
                target_temperature: None,
            },
        };
        self.send(room, "update hvac mode")
    }

    /// Set a room's temperature by display name; 0 °C switches heating off.
    /// `Ok(None)` when no room carries that name.
    pub fn set_room_temperature(&self, room_name: &str, celsius: u32) -> Result<Option<RoomId>, ApiError> {
        let rooms = self.client.authenticate_and_fetch()?;
        let Some(target) = rooms.iter().find(|r| r.name == room_name) else {
            info!("Adax: no room named {:?}", room_name);
            return Ok(None);
        };

        let room = if celsius == 0 {
            ControlRoom {
                id: target.id,
                heating_enabled: Some(false),
                target_temperature: None,
            }
        } else {
            ControlRoom {
                id: target.id,
                heating_enabled: Some(true),
                target_temperature: Some((i64::from(celsius) * 100).to_string()),
            }
        };
        let request = ControlRequest::single(room);
        debug!("Adax: set room temp json: {:?}", request);
        self.client.authenticate_and_control(&request)?;
        Ok(Some(target.id))
    }

    fn send(&self, room: ControlRoom, action: &str) -> bool {
        let request = ControlRequest::single(room);
        debug!("Adax: {} json: {:?}", action, request);
        match self.client.authenticate_and_control(&request) {
            Ok(()) => true,
            Err(e) => {
                info!("Adax: Failed to {}: {}", action, e);
                false
            }
        }
    }
}
