use argon2::Config as ArgonConfig;
use rand::Rng;
use rocket::http::Status;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::model::{
    api::{event::EventSummary, id::ApiId},
    db::account::{Account, NewAccount},
};

pub const MIN_PASSWORD_LENGTH: usize = 8;

pub const MAX_USERNAME_LENGTH: usize = 32;

/// Raw login credentials, received from a user. These are never stored
/// directly, since the password is in plaintext.
#[derive(Clone, Deserialize, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Body of `POST /account/register`.
#[derive(Clone, Deserialize, Serialize)]
pub struct RegisterRequest {
    pub user: Registration,
}

/// A new account's details.
#[derive(Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub username: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl TryFrom<Registration> for NewAccount {
    type Error = Error;

    /// Hash the password of a [`Registration`].
    /// The username must be non-empty and the password must meet the minimum length.
    fn try_from(registration: Registration) -> Result<Self, Self::Error> {
        let username = registration.username.trim();
        if username.is_empty() || username.chars().count() > MAX_USERNAME_LENGTH {
            return Err(Error::bad_request(format!(
                "Usernames must be between 1 and {MAX_USERNAME_LENGTH} characters"
            )));
        }
        if registration.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(Error::bad_request(format!(
                "Passwords must be at least {MIN_PASSWORD_LENGTH} characters"
            )));
        }

        // 16 bytes of salt is the recommended minimum for argon2.
        let mut salt = [0_u8; 16];
        rand::thread_rng().fill(&mut salt);
        let password_hash = argon2::hash_encoded(
            registration.password.as_bytes(),
            &salt,
            &ArgonConfig::default(),
        )
        .map_err(|e| Error::Status(Status::InternalServerError, e.to_string()))?;

        let display_name = registration
            .display_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());

        Ok(Self {
            username: username.to_string(),
            password_hash,
            display_name,
        })
    }
}

/// The signed-in account, as returned by `GET /account/session`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDescription {
    pub id: ApiId,
    pub username: String,
    pub display_name: String,
    /// Events this account moderates.
    pub events: Vec<EventSummary>,
}

impl SessionDescription {
    pub fn new(account: &Account, events: Vec<EventSummary>) -> Self {
        Self {
            id: account.id.into(),
            username: account.username.clone(),
            display_name: account.display_name().to_string(),
            events,
        }
    }
}

/// Body of `POST /singularity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRegistration {
    pub computer_id: String,
}
