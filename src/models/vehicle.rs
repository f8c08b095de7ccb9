//! Represents a registered vehicle.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A vehicle owned by one user. The plate is globally unique.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct Vehicle {
    pub id: Uuid,
    pub license_plate: String,
    /// e.g. "car", "bike", "truck".
    pub vehicle_type: String,
    pub user_id: Uuid,
}

/// Registration or update payload for a vehicle.
#[derive(Deserialize, Clone, Debug)]
pub struct VehicleInput {
    pub license_plate: String,
    pub vehicle_type: String,
}
