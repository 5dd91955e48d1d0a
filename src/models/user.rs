//! Library patron and librarian models

use serde::{Deserialize, Serialize};
use validator::Validate;

/// A user id that is known to exist on the backend.
///
/// The existence lookup answers `0` for unknown usernames; `from_lookup` refuses
/// that (and any non-positive value), so no request can carry a placeholder id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct UserId(i32);

impl UserId {
    pub fn from_lookup(raw: i32) -> Option<Self> {
        (raw > 0).then_some(Self(raw))
    }

    pub fn get(self) -> i32 {
        self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Library patron
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i32,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub has_issued: bool,
}

/// Create/update user request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewUser {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 4, message = "Password must be at least 4 characters"))]
    pub password: String,
    #[serde(default)]
    pub has_issued: bool,
}

/// Librarian account as listed by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Librarian {
    #[serde(default)]
    pub librarian_id: Option<i32>,
    pub librarian_name: String,
    #[serde(default)]
    pub active: bool,
}
