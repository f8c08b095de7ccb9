//! Identity of the caller, resolved upstream and handed to every operation.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::services::error::{ParkingError, ParkingResult};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "user" => Some(Role::User),
            _ => None,
        }
    }
}

/// The authenticated principal behind a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Caller {
    pub user_id: Uuid,
    pub role: Role,
}

impl Caller {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Guard placed in front of admin-only operations.
    pub fn require_admin(&self) -> ParkingResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ParkingError::Forbidden("admin role required".into()))
        }
    }
}
