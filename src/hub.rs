//! Shared cache of the latest room snapshot.
//!
//! Every heater entity reads from one hub. Refreshes swap the whole snapshot
//! and are serialized per hub; a refresh arriving within the minimum refresh
//! interval of the last successful one is answered from cache. Local patches
//! bridge the gap between a successful control call and the next refresh,
//! which overwrites them with server state.

use chrono::{DateTime, Utc};
use log::{debug, info};
use std::collections::BTreeMap;
use std::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use crate::client::{AdaxClient, ApiError};
use crate::models::adax::{Room, RoomId};
use crate::utils::{celsius_to_hundredths, hundredths_to_celsius, hundredths_to_whole_degrees};

/// Optimistic mutation of one cached room.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum PatchKind {
    /// Heating switched on or off together with a target, °C.
    Hvac { enabled: bool, target: f64 },
    /// Only the target changed, °C.
    SetTemp { target: f64 },
}

#[derive(Debug, Default)]
struct Snapshot {
    rooms: Vec<Room>,
    fetched_at: Option<DateTime<Utc>>,
    refreshed_at: Option<Instant>,
}

pub struct HeaterHub<'a> {
    client: &'a AdaxClient,
    min_refresh_interval: Duration,
    snapshot: RwLock<Snapshot>,
    refresh_lock: Mutex<()>,
}

impl<'a> HeaterHub<'a> {
    pub fn new(client: &'a AdaxClient, min_refresh_interval: Duration) -> Self {
        HeaterHub {
            client,
            min_refresh_interval,
            snapshot: RwLock::new(Snapshot::default()),
            refresh_lock: Mutex::new(()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Snapshot> {
        self.snapshot.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Snapshot> {
        self.snapshot.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Refresh from the API, logging failures. Returns whether the cached
    /// snapshot is current.
    pub fn refresh(&self) -> bool {
        let _serial = self.refresh_lock.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(last) = self.read().refreshed_at
            && last.elapsed() < self.min_refresh_interval
        {
            debug!("Adax: refresh throttled ({}ms since last)", last.elapsed().as_millis());
            return true;
        }

        match self.fetch_and_replace() {
            Ok(count) => {
                debug!("Adax: refreshed {} room(s)", count);
                true
            }
            Err(e) => {
                info!("Adax: Failed to update information: {}", e);
                false
            }
        }
    }

    /// Unthrottled refresh that reports the failure, used at setup time.
    pub fn try_refresh(&self) -> Result<usize, ApiError> {
        let _serial = self.refresh_lock.lock().unwrap_or_else(|e| e.into_inner());
        self.fetch_and_replace()
    }

    fn fetch_and_replace(&self) -> Result<usize, ApiError> {
        let rooms = self.client.authenticate_and_fetch()?;
        let count = rooms.len();
        self.replace_rooms(rooms);
        Ok(count)
    }

    pub(crate) fn replace_rooms(&self, rooms: Vec<Room>) {
        let mut snap = self.write();
        snap.rooms = rooms;
        snap.fetched_at = Some(Utc::now());
        snap.refreshed_at = Some(Instant::now());
    }

    /// Patch the cached copy of one room without talking to the server.
    /// Returns false when the room is not in the snapshot.
    pub fn apply_local_patch(&self, id: RoomId, patch: PatchKind) -> bool {
        let mut snap = self.write();
        let Some(room) = snap.rooms.iter_mut().find(|r| r.id == id) else {
            debug!("Adax: patch for unknown room {}", id);
            return false;
        };
        match patch {
            PatchKind::Hvac { enabled, target } => {
                room.heating_enabled = enabled;
                room.target_temperature = celsius_to_hundredths(target);
            }
            PatchKind::SetTemp { target } => {
                room.target_temperature = celsius_to_hundredths(target);
            }
        }
        true
    }

    /// Whole-degree targets of rooms that are heating. Rooms with heating
    /// disabled are absent, not zero.
    pub fn target_temperatures(&self) -> BTreeMap<RoomId, i64> {
        self.read()
            .rooms
            .iter()
            .filter(|r| r.heating_enabled)
            .map(|r| (r.id, hundredths_to_whole_degrees(r.target_temperature)))
            .collect()
    }

    pub fn current_temperatures(&self) -> BTreeMap<RoomId, f64> {
        self.read()
            .rooms
            .iter()
            .map(|r| (r.id, hundredths_to_celsius(r.temperature)))
            .collect()
    }

    pub fn heating_flags(&self) -> BTreeMap<RoomId, bool> {
        self.read().rooms.iter().map(|r| (r.id, r.heating_enabled)).collect()
    }

    pub fn room(&self, id: RoomId) -> Option<Room> {
        self.read().rooms.iter().find(|r| r.id == id).cloned()
    }

    pub fn rooms(&self) -> Vec<Room> {
        self.read().rooms.clone()
    }

    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.read().fetched_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    fn room(id: i64, name: &str, temperature: i64, target: i64, heating: bool) -> Room {
        Room {
            id: RoomId(id),
            name: name.to_string(),
            zone_name: "Home".to_string(),
            temperature,
            target_temperature: target,
            heating_enabled: heating,
        }
    }

    fn offline_client() -> AdaxClient {
        AdaxClient::new("http://127.0.0.1:9", "u", "p", false, Some(Duration::from_secs(1)))
    }

    fn sample_rooms() -> Vec<Room> {
        vec![
            room(1, "Kitchen", 2137, 2299, true),
            room(2, "Bedroom", 1850, 2000, false),
            room(3, "Office", -150, 1900, true),
        ]
    }

    #[test]
    fn current_temperatures_cover_every_room() {
        let client = offline_client();
        let hub = HeaterHub::new(&client, Duration::ZERO);
        hub.replace_rooms(sample_rooms());

        let current = hub.current_temperatures();
        assert_eq!(current.len(), 3);
        for r in sample_rooms() {
            assert_eq!(current[&r.id], r.temperature as f64 / 100.0);
        }
    }

    #[test]
    fn target_temperatures_truncate_and_skip_disabled_rooms() {
        let client = offline_client();
        let hub = HeaterHub::new(&client, Duration::ZERO);
        hub.replace_rooms(sample_rooms());

        let targets = hub.target_temperatures();
        assert_eq!(targets.get(&RoomId(1)), Some(&22));
        assert!(!targets.contains_key(&RoomId(2)));
        assert_eq!(targets.get(&RoomId(3)), Some(&19));

        let flags = hub.heating_flags();
        assert!(flags[&RoomId(1)]);
        assert!(!flags[&RoomId(2)]);
    }

    #[test]
    fn settemp_patch_only_touches_target() {
        let client = offline_client();
        let hub = HeaterHub::new(&client, Duration::ZERO);
        hub.replace_rooms(sample_rooms());

        assert!(hub.apply_local_patch(RoomId(2), PatchKind::SetTemp { target: 23.5 }));

        let patched = hub.room(RoomId(2)).unwrap();
        assert_eq!(patched.target_temperature, 2350);
        assert!(!patched.heating_enabled);
        assert_eq!(patched.temperature, 1850);
        assert_eq!(hub.room(RoomId(1)).unwrap(), sample_rooms()[0]);
        assert_eq!(hub.room(RoomId(3)).unwrap(), sample_rooms()[2]);
    }

    #[test]
    fn hvac_patch_sets_flag_and_target() {
        let client = offline_client();
        let hub = HeaterHub::new(&client, Duration::ZERO);
        hub.replace_rooms(sample_rooms());

        assert!(hub.apply_local_patch(
            RoomId(2),
            PatchKind::Hvac {
                enabled: true,
                target: 21.0
            }
        ));
        let patched = hub.room(RoomId(2)).unwrap();
        assert!(patched.heating_enabled);
        assert_eq!(patched.target_temperature, 2100);
        assert_eq!(hub.target_temperatures().get(&RoomId(2)), Some(&21));

        assert!(hub.apply_local_patch(
            RoomId(1),
            PatchKind::Hvac {
                enabled: false,
                target: 22.0
            }
        ));
        assert!(!hub.target_temperatures().contains_key(&RoomId(1)));
    }

    #[test]
    fn patch_for_unknown_room_is_a_no_op() {
        let client = offline_client();
        let hub = HeaterHub::new(&client, Duration::ZERO);
        hub.replace_rooms(sample_rooms());
        assert!(!hub.apply_local_patch(RoomId(99), PatchKind::SetTemp { target: 20.0 }));
        assert_eq!(hub.rooms(), sample_rooms());
    }

    #[test]
    fn refresh_loads_rooms_from_api() {
        let mut server = Server::new();
        let _token = server
            .mock("POST", "/auth/token")
            .with_status(200)
            .with_body(r#"{"access_token":"tok"}"#)
            .create();
        let _content = server
            .mock("GET", "/rest/v1/content/")
            .match_header("authorization", "Bearer tok")
            .with_status(200)
            .with_body(
                r#"{"rooms":[{"id":7,"name":"Kitchen","temperature":2100,"targetTemperature":2200,"heatingEnabled":true}]}"#,
            )
            .create();

        let client = AdaxClient::new(server.url(), "u", "p", false, None);
        let hub = HeaterHub::new(&client, Duration::ZERO);
        assert!(hub.fetched_at().is_none());
        assert!(hub.refresh());

        assert_eq!(hub.current_temperatures(), BTreeMap::from([(RoomId(7), 21.0)]));
        assert_eq!(hub.target_temperatures(), BTreeMap::from([(RoomId(7), 22)]));
        assert!(hub.fetched_at().is_some());
    }

    #[test]
    fn refresh_overwrites_local_patches() {
        let mut server = Server::new();
        let _token = server
            .mock("POST", "/auth/token")
            .with_status(200)
            .with_body(r#"{"access_token":"tok"}"#)
            .create();
        let _content = server
            .mock("GET", "/rest/v1/content/")
            .with_status(200)
            .with_body(
                r#"{"rooms":[{"id":7,"name":"Kitchen","temperature":2100,"targetTemperature":2200,"heatingEnabled":true}]}"#,
            )
            .create();

        let client = AdaxClient::new(server.url(), "u", "p", false, None);
        let hub = HeaterHub::new(&client, Duration::ZERO);
        assert!(hub.refresh());
        hub.apply_local_patch(
            RoomId(7),
            PatchKind::Hvac {
                enabled: false,
                target: 18.0,
            },
        );
        assert!(hub.refresh());
        assert!(hub.heating_flags()[&RoomId(7)]);
        assert_eq!(hub.target_temperatures()[&RoomId(7)], 22);
    }

    #[test]
    fn failed_refresh_keeps_previous_snapshot() {
        let mut server = Server::new();
        let _token = server.mock("POST", "/auth/token").with_status(500).create();
        let content = server.mock("GET", "/rest/v1/content/").expect(0).create();

        let client = AdaxClient::new(server.url(), "u", "p", false, None);
        let hub = HeaterHub::new(&client, Duration::ZERO);
        hub.replace_rooms(sample_rooms());

        assert!(!hub.refresh());
        assert_eq!(hub.rooms(), sample_rooms());
        assert!(matches!(hub.try_refresh(), Err(ApiError::Auth { status: 500, .. })));
        content.assert();
    }

    #[test]
    fn refresh_within_min_interval_uses_cache() {
        let mut server = Server::new();
        let token = server
            .mock("POST", "/auth/token")
            .with_status(200)
            .with_body(r#"{"access_token":"tok"}"#)
            .expect(1)
            .create();
        let content = server
            .mock("GET", "/rest/v1/content/")
            .with_status(200)
            .with_body(r#"{"rooms":[]}"#)
            .expect(1)
            .create();

        let client = AdaxClient::new(server.url(), "u", "p", false, None);
        let hub = HeaterHub::new(&client, Duration::from_secs(600));
        assert!(hub.refresh());
        assert!(hub.refresh());
        assert!(hub.refresh());
        token.assert();
        content.assert();
    }
}
