//! Startup: credential check, first snapshot, one entity per room.

use core::fmt;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

use crate::client::{AdaxClient, ApiError};
use crate::control::HeaterControl;
use crate::entity::HeaterEntity;
use crate::hub::HeaterHub;

#[derive(Debug)]
pub enum SetupError {
    /// The token endpoint rejected the credentials.
    InvalidCredentials { status: u16 },
    /// The API could not be reached or answered badly; try again later.
    NotReady(ApiError),
}

impl Display for SetupError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SetupError::InvalidCredentials { status } => {
                write!(f, "login rejected (http {}); check ADAX_USERNAME/ADAX_PASSWORD", status)
            }
            SetupError::NotReady(e) => write!(f, "adax api not ready: {}", e),
        }
    }
}

impl Error for SetupError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SetupError::NotReady(e) => Some(e),
            SetupError::InvalidCredentials { .. } => None,
        }
    }
}

/// Test login, as done before accepting a new account.
pub fn validate_credentials(client: &AdaxClient) -> Result<(), SetupError> {
    match client.authenticate() {
        Ok(_) => {
            info!("Adax: login successful");
            Ok(())
        }
        Err(ApiError::Auth { status, .. }) => {
            info!("Adax: Failed to login to retrieve token: {}", status);
            Err(SetupError::InvalidCredentials { status })
        }
        Err(e) => Err(SetupError::NotReady(e)),
    }
}

/// Load the first snapshot. Any failure means "not ready yet".
pub fn load_initial(hub: &HeaterHub<'_>) -> Result<usize, SetupError> {
    let count = hub.try_refresh().map_err(SetupError::NotReady)?;
    if count == 0 {
        warn!("Adax: account has no rooms");
    } else {
        info!("Adax: discovered {} room(s)", count);
    }
    Ok(count)
}

/// One entity per room in the current snapshot.
pub fn discover_entities<'a>(hub: &'a HeaterHub<'a>, control: &'a HeaterControl<'a>) -> Vec<HeaterEntity<'a>> {
    hub.rooms()
        .iter()
        .map(|room| HeaterEntity::new(room, hub, control))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::ClimateEntity;
    use crate::models::adax::RoomId;
    use mockito::Server;
    use std::time::Duration;

    #[test]
    fn rejected_login_is_invalid_credentials() {
        let mut server = Server::new();
        let _token = server.mock("POST", "/auth/token").with_status(401).create();

        let client = AdaxClient::new(server.url(), "u", "p", false, None);
        assert!(matches!(
            validate_credentials(&client),
            Err(SetupError::InvalidCredentials { status: 401 })
        ));
    }

    #[test]
    fn unreachable_api_is_not_ready() {
        let client = AdaxClient::new("http://127.0.0.1:9", "u", "p", false, Some(Duration::from_secs(2)));
        assert!(matches!(validate_credentials(&client), Err(SetupError::NotReady(_))));
    }

    #[test]
    fn failed_first_fetch_is_not_ready() {
        let mut server = Server::new();
        let _token = server.mock("POST", "/auth/token").with_status(403).create();

        let client = AdaxClient::new(server.url(), "u", "p", false, None);
        let hub = HeaterHub::new(&client, Duration::ZERO);
        match load_initial(&hub) {
            Err(SetupError::NotReady(ApiError::Auth { status, .. })) => assert_eq!(status, 403),
            other => panic!("expected not ready, got {:?}", other),
        }
    }

    #[test]
    fn creates_one_entity_per_room() {
        let mut server = Server::new();
        let _token = server
            .mock("POST", "/auth/token")
            .with_status(200)
            .with_body(r#"{"access_token":"tok"}"#)
            .create();
        let _content = server
            .mock("GET", "/rest/v1/content/")
            .with_status(200)
            .with_body(std::fs::read_to_string("tests/data/content.json").expect("fixture present"))
            .create();

        let client = AdaxClient::new(server.url(), "u", "p", false, None);
        let hub = HeaterHub::new(&client, Duration::ZERO);
        let control = HeaterControl::new(&client);
        assert_eq!(load_initial(&hub).unwrap(), 3);

        let entities = discover_entities(&hub, &control);
        let ids: Vec<RoomId> = entities.iter().map(|e| e.unique_id()).collect();
        assert_eq!(ids, vec![RoomId(7), RoomId(8), RoomId(12)]);
        assert_eq!(entities[2].name(), "Adax Garage");
    }
}
