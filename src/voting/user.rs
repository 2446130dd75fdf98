use serde::{Deserialize, Serialize};

use super::id::UserId;
use crate::error::{self, ApiError};

/// A registered user as the rest of the application sees it. The password
/// hash never leaves the persistence layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub username: String,
    pub is_admin: bool,
}

impl User {
    /// Fails with the given denial unless the user is an admin.
    pub fn require_admin(&self, denial: fn() -> ApiError) -> Result<(), ApiError> {
        if self.is_admin {
            Ok(())
        } else {
            Err(denial())
        }
    }
}

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct UnvalidatedRegistration {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl TryFrom<UnvalidatedRegistration> for Registration {
    type Error = ApiError;
    fn try_from(value: UnvalidatedRegistration) -> Result<Self, Self::Error> {
        let UnvalidatedRegistration { username, email, password } = value;
        match (required(username), required(email), required(password)) {
            (Some(username), Some(email), Some(password)) => Ok(Self { username, email, password }),
            _ => Err(error::missing_fields()),
        }
    }
}

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct UnvalidatedCredentials {
    pub email: Option<String>,
    pub password: Option<String>,
}

pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl TryFrom<UnvalidatedCredentials> for Credentials {
    type Error = ApiError;
    fn try_from(value: UnvalidatedCredentials) -> Result<Self, Self::Error> {
        match (required(value.email), required(value.password)) {
            (Some(email), Some(password)) => Ok(Self { email, password }),
            _ => Err(error::missing_fields()),
        }
    }
}

fn required(field: Option<String>) -> Option<String> {
    field.filter(|value| !value.is_empty())
}
