//! Climate entity for one heater room.
//!
//! The entity keeps its own view of the target temperature and heating state,
//! set optimistically by commands and replaced from the hub on every poll tick.
//! Server state wins: whatever the hub reports after a refresh overrides the
//! local view.

use log::{debug, info};
use serde::Serialize;

use crate::control::{HeaterControl, heat_target};
use crate::hub::{HeaterHub, PatchKind};
use crate::models::adax::{HvacAction, HvacMode, Room, RoomId};
use crate::utils::{hundredths_to_celsius, hundredths_to_whole_degrees};

pub const DOMAIN: &str = "adax_heater";
pub const MANUFACTURER: &str = "Adax";
pub const MODEL: &str = "WIFI";
pub const MIN_TEMP: f64 = 5.0;
pub const MAX_TEMP: f64 = 35.0;
pub const TARGET_TEMPERATURE_STEP: f64 = 1.0;
pub const HVAC_MODES: [HvacMode; 2] = [HvacMode::Heat, HvacMode::Off];

/// What a host needs from a thermostat-like entity.
pub trait ClimateEntity {
    fn unique_id(&self) -> RoomId;
    fn current_temperature(&self) -> Option<f64>;
    fn target_temperature(&self) -> Option<f64>;
    fn hvac_mode(&self) -> HvacMode;
    fn set_temperature(&mut self, celsius: f64) -> bool;
    fn set_hvac_mode(&mut self, mode: HvacMode) -> bool;
    /// Poll tick: refresh the hub and re-read this entity's state.
    fn update(&mut self) -> bool;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeaterAttributes {
    pub heating: bool,
    pub room: String,
    pub id: RoomId,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceInfo {
    pub identifiers: (&'static str, RoomId),
    pub name: String,
    pub manufacturer: &'static str,
    pub model: &'static str,
}

/// Everything a host shows for one heater, serialized by `status --json`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityState {
    pub unique_id: RoomId,
    pub name: String,
    pub available: bool,
    pub current_temperature: Option<f64>,
    pub target_temperature: Option<f64>,
    pub hvac_mode: HvacMode,
    pub hvac_action: HvacAction,
    pub hvac_modes: [HvacMode; 2],
    pub min_temp: f64,
    pub max_temp: f64,
    pub target_temperature_step: f64,
    pub attributes: HeaterAttributes,
    pub device_info: DeviceInfo,
}

pub struct HeaterEntity<'a> {
    id: RoomId,
    room_name: String,
    hub: &'a HeaterHub<'a>,
    control: &'a HeaterControl<'a>,
    /// Last known or requested target, °C.
    settemp: Option<f64>,
    hvac: bool,
}

impl<'a> HeaterEntity<'a> {
    pub fn new(room: &Room, hub: &'a HeaterHub<'a>, control: &'a HeaterControl<'a>) -> Self {
        let settemp = room
            .heating_enabled
            .then(|| hundredths_to_whole_degrees(room.target_temperature) as f64);
        HeaterEntity {
            id: room.id,
            room_name: room.name.clone(),
            hub,
            control,
            settemp,
            hvac: room.heating_enabled,
        }
    }

    pub fn name(&self) -> String {
        format!("Adax {}", self.room_name)
    }

    /// Available while the room is part of the latest snapshot.
    pub fn available(&self) -> bool {
        self.hub.room(self.id).is_some()
    }

    pub fn hvac_action(&self) -> HvacAction {
        if self.hvac { HvacAction::Heating } else { HvacAction::Idle }
    }

    pub fn attributes(&self) -> HeaterAttributes {
        HeaterAttributes {
            heating: self.hvac,
            room: self.room_name.clone(),
            id: self.id,
        }
    }

    pub fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            identifiers: (DOMAIN, self.id),
            name: self.name(),
            manufacturer: MANUFACTURER,
            model: MODEL,
        }
    }

    pub fn state(&self) -> EntityState {
        EntityState {
            unique_id: self.id,
            name: self.name(),
            available: self.available(),
            current_temperature: self.current_temperature(),
            target_temperature: self.target_temperature(),
            hvac_mode: self.hvac_mode(),
            hvac_action: self.hvac_action(),
            hvac_modes: HVAC_MODES,
            min_temp: MIN_TEMP,
            max_temp: MAX_TEMP,
            target_temperature_step: TARGET_TEMPERATURE_STEP,
            attributes: self.attributes(),
            device_info: self.device_info(),
        }
    }
}

impl ClimateEntity for HeaterEntity<'_> {
    fn unique_id(&self) -> RoomId {
        self.id
    }

    fn current_temperature(&self) -> Option<f64> {
        self.hub.current_temperatures().get(&self.id).copied()
    }

    fn target_temperature(&self) -> Option<f64> {
        self.settemp
    }

    fn hvac_mode(&self) -> HvacMode {
        if self.hvac { HvacMode::Heat } else { HvacMode::Off }
    }

    fn set_temperature(&mut self, celsius: f64) -> bool {
        if !(MIN_TEMP..=MAX_TEMP).contains(&celsius) {
            info!(
                "Adax: {} outside {}..={} for room {}",
                celsius, MIN_TEMP, MAX_TEMP, self.id
            );
            return false;
        }
        if (celsius / TARGET_TEMPERATURE_STEP).fract() != 0.0 {
            info!(
                "Adax: {} is not a multiple of the {} °C step for room {}",
                celsius, TARGET_TEMPERATURE_STEP, self.id
            );
            return false;
        }
        if !self.control.set_temperature(self.id, celsius) {
            return false;
        }
        self.hvac = true;
        self.settemp = Some(celsius);
        self.hub.apply_local_patch(self.id, PatchKind::SetTemp { target: celsius });
        true
    }

    fn set_hvac_mode(&mut self, mode: HvacMode) -> bool {
        let Some(room) = self.hub.room(self.id) else {
            info!("Adax: room {} not in snapshot, cannot change hvac mode", self.id);
            return false;
        };
        if !self
            .control
            .set_hvac_mode(self.id, mode, self.settemp, room.temperature)
        {
            return false;
        }

        let target = hundredths_to_celsius(heat_target(self.settemp, room.temperature));
        let enabled = mode == HvacMode::Heat;
        self.hvac = enabled;
        if enabled {
            self.settemp = Some(target);
        }
        self.hub.apply_local_patch(self.id, PatchKind::Hvac { enabled, target });
        debug!(
            "Adax: room {} hvac {} settemp {:?}",
            self.id, self.hvac, self.settemp
        );
        true
    }

    fn update(&mut self) -> bool {
        let refreshed = self.hub.refresh();
        match self.hub.heating_flags().get(&self.id) {
            Some(true) => {
                self.hvac = true;
                if let Some(target) = self.hub.target_temperatures().get(&self.id) {
                    self.settemp = Some(*target as f64);
                }
            }
            Some(false) => self.hvac = false,
            None => debug!("Adax: room {} missing from snapshot", self.id),
        }
        refreshed
    }
}
