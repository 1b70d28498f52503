//! Command-line entry points: the poll loop plus one-shot control commands.

use log::info;

use crate::client::AdaxClient;
use crate::config::Config;
use crate::control::HeaterControl;
use crate::entity::{ClimateEntity, EntityState, HeaterEntity};
use crate::hub::HeaterHub;
use crate::models::adax::{HvacMode, RoomId};
use crate::services::{poll, setup};

pub const USAGE: &str = "usage: adax-heater [--env-file <path>] [COMMAND]

commands:
  run                              poll all heaters forever (default)
  status [--json]                  print every room once
  validate                         check the configured credentials
  set-temp <room-id> <celsius>     change a room's target temperature
  heat <room-id>                   switch heating on
  off <room-id>                    switch heating off
  mode <room-id> <heat|off>        same as heat/off
  set-room <name> <celsius>        set temperature by room name (0 = off)";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Run,
    Status { json: bool },
    Validate,
    SetTemperature { room: RoomId, celsius: f64 },
    SetHvacMode { room: RoomId, mode: HvacMode },
    SetRoomTemperature { name: String, celsius: u32 },
}

impl Command {
    pub fn parse(args: &[String]) -> Result<Self, String> {
        let Some((name, rest)) = args.split_first() else {
            return Ok(Command::Run);
        };
        let rest: Vec<&str> = rest.iter().map(String::as_str).collect();
        match (name.as_str(), rest.as_slice()) {
            ("run", []) => Ok(Command::Run),
            ("status", []) => Ok(Command::Status { json: false }),
            ("status", ["--json"]) => Ok(Command::Status { json: true }),
            ("validate", []) => Ok(Command::Validate),
            ("set-temp", [room, celsius]) => Ok(Command::SetTemperature {
                room: parse_room(room)?,
                celsius: celsius
                    .parse::<f64>()
                    .map_err(|_| format!("invalid temperature: {}", celsius))?,
            }),
            ("heat", [room]) => Ok(Command::SetHvacMode {
                room: parse_room(room)?,
                mode: HvacMode::Heat,
            }),
            ("off", [room]) => Ok(Command::SetHvacMode {
                room: parse_room(room)?,
                mode: HvacMode::Off,
            }),
            ("mode", [room, mode]) => Ok(Command::SetHvacMode {
                room: parse_room(room)?,
                mode: mode.parse::<HvacMode>()?,
            }),
            ("set-room", [name, celsius]) => Ok(Command::SetRoomTemperature {
                name: name.to_string(),
                celsius: celsius
                    .parse::<u32>()
                    .map_err(|_| format!("invalid room temperature: {}", celsius))?,
            }),
            (other, _) => Err(format!("unrecognised command or arguments: {}\n\n{}", other, USAGE)),
        }
    }
}

fn parse_room(raw: &str) -> Result<RoomId, String> {
    raw.parse::<i64>()
        .map(RoomId)
        .map_err(|_| format!("invalid room id: {}", raw))
}

pub fn execute(cfg: &Config, command: Command) -> Result<(), String> {
    let client = AdaxClient::from_config(cfg);
    let control = HeaterControl::new(&client);

    match command {
        Command::Validate => setup::validate_credentials(&client).map_err(|e| e.to_string()),
        Command::SetRoomTemperature { name, celsius } => match control.set_room_temperature(&name, celsius) {
            Ok(Some(id)) => {
                info!("Room {:?} (id {}) set to {} °C", name, id, celsius);
                Ok(())
            }
            Ok(None) => Err(format!("no room named {:?}", name)),
            Err(e) => Err(format!("set-room failed: {}", e)),
        },
        other => {
            let hub = HeaterHub::new(&client, cfg.min_refresh_interval);
            setup::load_initial(&hub).map_err(|e| e.to_string())?;
            let mut entities = setup::discover_entities(&hub, &control);
            run_with_entities(cfg, &hub, &mut entities, other)
        }
    }
}

fn run_with_entities(
    cfg: &Config,
    hub: &HeaterHub<'_>,
    entities: &mut [HeaterEntity<'_>],
    command: Command,
) -> Result<(), String> {
    match command {
        Command::Run => {
            info!(
                "Starting poll loop: heaters={}, interval={}s",
                entities.len(),
                cfg.poll_interval.as_secs()
            );
            poll::run_loop(hub, entities, cfg.poll_interval, None);
            Ok(())
        }
        Command::Status { json: false } => {
            for entity in entities.iter() {
                println!("{}", status_line(entity));
            }
            Ok(())
        }
        Command::Status { json: true } => {
            let states: Vec<EntityState> = entities.iter().map(HeaterEntity::state).collect();
            let out = serde_json::to_string_pretty(&states).map_err(|e| format!("failed to encode status: {}", e))?;
            println!("{}", out);
            Ok(())
        }
        Command::SetTemperature { room, celsius } => {
            let entity = find(entities, room)?;
            if entity.set_temperature(celsius) {
                info!("{} target set to {} °C", entity.name(), celsius);
                Ok(())
            } else {
                Err(format!("setting temperature of room {} failed", room))
            }
        }
        Command::SetHvacMode { room, mode } => {
            let entity = find(entities, room)?;
            if entity.set_hvac_mode(mode) {
                info!(
                    "{} switched to {:?} (target {:?})",
                    entity.name(),
                    mode,
                    entity.target_temperature()
                );
                Ok(())
            } else {
                Err(format!("changing hvac mode of room {} failed", room))
            }
        }
        Command::Validate | Command::SetRoomTemperature { .. } => Ok(()),
    }
}

fn find<'e, 'a>(entities: &'e mut [HeaterEntity<'a>], room: RoomId) -> Result<&'e mut HeaterEntity<'a>, String> {
    entities
        .iter_mut()
        .find(|e| e.unique_id() == room)
        .ok_or_else(|| format!("room {} not found", room))
}

fn status_line(entity: &HeaterEntity<'_>) -> String {
    let fmt_temp = |t: Option<f64>| t.map(|v| format!("{:.2}", v)).unwrap_or_else(|| "-".to_string());
    format!(
        "{:>8}  {:<24} current={:>6}  target={:>6}  mode={:?}  action={:?}{}",
        entity.unique_id(),
        entity.name(),
        fmt_temp(entity.current_temperature()),
        fmt_temp(entity.target_temperature()),
        entity.hvac_mode(),
        entity.hvac_action(),
        if entity.available() { "" } else { "  (unavailable)" }
    )
}
