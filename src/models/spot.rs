//! Represents a single parking spot and its allocation state.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Spot type given to every freshly provisioned spot.
pub const DEFAULT_SPOT_TYPE: &str = "compact";

/// Authoritative allocation state of a spot.
///
/// Persisted as lowercase text. `Occupied` is the only status whose
/// occupancy flag is set.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum SpotStatus {
    Available,
    Occupied,
    Reserved,
}

impl SpotStatus {
    /// Occupancy flag stored next to the status.
    pub fn occupied_flag(self) -> bool {
        matches!(self, SpotStatus::Occupied)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SpotStatus::Available => "available",
            SpotStatus::Occupied => "occupied",
            SpotStatus::Reserved => "reserved",
        }
    }
}

/// A parking spot belonging to exactly one lot.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct ParkingSpot {
    /// Unique identifier for this spot.
    pub id: Uuid,

    /// Owning lot.
    pub lot_id: Uuid,

    /// Number of the spot within its lot, starting at 1.
    pub spot_number: i64,

    /// Free-form type tag (e.g. "compact", "large", "ev").
    pub spot_type: String,

    /// Derived occupancy flag, kept equal to `status == Occupied`.
    pub is_occupied: bool,

    /// Current allocation state.
    pub status: SpotStatus,
}

/// Partial spot update accepted from admins.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct SpotUpdate {
    pub spot_type: Option<String>,
    pub is_occupied: Option<bool>,
}
