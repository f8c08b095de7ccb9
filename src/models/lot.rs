//! Represents a parking lot and the availability figures derived from its spots.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::spot::SpotStatus;

/// A parking lot. Owns its spots; deleting the lot cascades to them.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct ParkingLot {
    /// Unique identifier for this lot.
    pub id: Uuid,

    /// Display name (the "prime location" shown to drivers).
    pub name: String,

    /// Street address. No two lots share one.
    pub address: String,

    /// Price charged per started hour.
    pub price_per_hour: f64,

    /// Postal code of the address.
    pub pin_code: String,

    /// Declared number of spots, always at least 1.
    pub spot_count: i64,
}

/// Fields accepted when provisioning a new lot.
#[derive(Deserialize, Clone, Debug)]
pub struct NewLot {
    pub name: String,
    pub address: String,
    pub price_per_hour: f64,
    pub pin_code: String,
    pub spot_count: i64,
}

/// Partial lot update. `None` leaves the field untouched.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct LotUpdate {
    pub name: Option<String>,
    pub address: Option<String>,
    pub price_per_hour: Option<f64>,
    pub pin_code: Option<String>,
    pub spot_count: Option<i64>,
}

impl LotUpdate {
    /// True when the update touches identity fields or the spot count
    /// relative to `lot`. Price-only changes are not identity changes.
    pub fn changes_identity_of(&self, lot: &ParkingLot) -> bool {
        self.name.as_ref().is_some_and(|n| *n != lot.name)
            || self.address.as_ref().is_some_and(|a| *a != lot.address)
            || self.pin_code.as_ref().is_some_and(|p| *p != lot.pin_code)
            || self.resizes(lot)
    }

    /// True when the update asks for a different number of spots.
    pub fn resizes(&self, lot: &ParkingLot) -> bool {
        self.spot_count.is_some_and(|c| c != lot.spot_count)
    }
}

/// Occupancy counters for one lot.
///
/// `available` is derived as `total - occupied - reserved`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SpotCounts {
    pub total: i64,
    pub occupied: i64,
    pub reserved: i64,
    pub available: i64,
}

impl SpotCounts {
    pub fn new(total: i64, occupied: i64, reserved: i64) -> Self {
        Self {
            total,
            occupied,
            reserved,
            available: total - occupied - reserved,
        }
    }

    /// Count spot statuses as already resolved by the caller.
    pub fn tally<'a>(statuses: impl IntoIterator<Item = &'a SpotStatus>) -> Self {
        let (mut total, mut occupied, mut reserved) = (0, 0, 0);
        for status in statuses {
            total += 1;
            match status {
                SpotStatus::Occupied => occupied += 1,
                SpotStatus::Reserved => reserved += 1,
                SpotStatus::Available => {}
            }
        }
        Self::new(total, occupied, reserved)
    }
}

/// A lot together with its live counters, as listed to drivers and admins.
#[derive(Serialize, Clone, Debug)]
pub struct LotOverview {
    #[serde(flatten)]
    pub lot: ParkingLot,
    #[serde(flatten)]
    pub counts: SpotCounts,
}

/// Per-spot line of a lot summary.
#[derive(Serialize, Clone, Debug)]
pub struct SpotLine {
    pub spot_id: Uuid,
    pub spot_number: i64,
    pub spot_type: String,
    pub is_occupied: bool,
    pub status: SpotStatus,
}

/// Lot summary: counters plus the full spot list.
#[derive(Serialize, Clone, Debug)]
pub struct LotSummary {
    #[serde(flatten)]
    pub lot: ParkingLot,
    #[serde(flatten)]
    pub counts: SpotCounts,
    pub spots: Vec<SpotLine>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lot() -> ParkingLot {
        ParkingLot {
            id: Uuid::new_v4(),
            name: "Central".into(),
            address: "1 Main Road".into(),
            price_per_hour: 20.0,
            pin_code: "560001".into(),
            spot_count: 4,
        }
    }

    #[test]
    fn available_is_total_minus_occupied_and_reserved() {
        let counts = SpotCounts::new(10, 3, 2);
        assert_eq!(counts.available, 5);
    }

    #[test]
    fn tally_counts_each_status_once() {
        let statuses = [
            SpotStatus::Available,
            SpotStatus::Reserved,
            SpotStatus::Occupied,
            SpotStatus::Occupied,
        ];
        assert_eq!(SpotCounts::tally(&statuses), SpotCounts::new(4, 2, 1));
    }

    #[test]
    fn price_only_update_is_not_an_identity_change() {
        let update = LotUpdate {
            price_per_hour: Some(35.0),
            spot_count: Some(4),
            ..LotUpdate::default()
        };
        assert!(!update.changes_identity_of(&lot()));
    }

    #[test]
    fn renaming_or_resizing_is_an_identity_change() {
        let rename = LotUpdate {
            name: Some("North".into()),
            ..LotUpdate::default()
        };
        let resize = LotUpdate {
            spot_count: Some(6),
            ..LotUpdate::default()
        };
        assert!(rename.changes_identity_of(&lot()));
        assert!(resize.changes_identity_of(&lot()));
        assert!(resize.resizes(&lot()));
    }
}
