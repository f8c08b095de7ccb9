//! Represents a short-lived hold on a spot.

use chrono::{DateTime, FixedOffset, TimeDelta};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Length of a hold, in minutes.
pub const HOLD_MINUTES: i64 = 30;

/// A time-boxed hold of a spot by a vehicle.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct Reservation {
    pub id: Uuid,
    pub vehicle_id: Uuid,
    pub spot_id: Uuid,
    pub created_at: DateTime<FixedOffset>,
    pub expires_at: DateTime<FixedOffset>,
}

impl Reservation {
    /// Expiry for a hold created at `created_at`.
    pub fn expiry_for(created_at: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
        created_at + TimeDelta::minutes(HOLD_MINUTES)
    }

    /// The single liveness rule: a hold is live strictly before its expiry.
    ///
    /// The sweep, reservation and booking paths all go through this.
    pub fn is_live(&self, now: DateTime<FixedOffset>) -> bool {
        hold_is_live(self.expires_at, now)
    }
}

fn hold_is_live(expires_at: DateTime<FixedOffset>, now: DateTime<FixedOffset>) -> bool {
    expires_at > now
}

/// Result of a successful reservation.
#[derive(Serialize, Clone, Debug)]
pub struct ReservationReceipt {
    pub reservation_id: Uuid,
    pub expires_at: DateTime<FixedOffset>,
}

/// A live reservation as listed back to its owner.
#[derive(Serialize, Clone, FromRow, Debug)]
pub struct ReservationView {
    pub id: Uuid,
    pub vehicle_id: Uuid,
    pub license_plate: String,
    pub spot_id: Uuid,
    pub spot_number: i64,
    pub lot_id: Uuid,
    pub location_name: String,
    pub created_at: DateTime<FixedOffset>,
    pub expires_at: DateTime<FixedOffset>,
}

impl ReservationView {
    pub fn is_live(&self, now: DateTime<FixedOffset>) -> bool {
        hold_is_live(self.expires_at, now)
    }
}
