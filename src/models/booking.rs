//! Represents an occupancy record (a booking) and its read projections.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// An open-ended occupancy of a spot by a vehicle.
///
/// Active while `end_time` is `None`; completed once released.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct Booking {
    pub id: Uuid,
    pub vehicle_id: Uuid,

    /// Null once the spot has been deleted; historical bookings remain.
    pub spot_id: Option<Uuid>,

    pub start_time: DateTime<FixedOffset>,
    pub end_time: Option<DateTime<FixedOffset>>,
    pub created_at: DateTime<FixedOffset>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Active,
    Completed,
}

impl Booking {
    pub fn status(&self) -> BookingStatus {
        if self.end_time.is_none() {
            BookingStatus::Active
        } else {
            BookingStatus::Completed
        }
    }

    pub fn is_active(&self) -> bool {
        self.status() == BookingStatus::Active
    }
}

/// Flat row produced by the booking listing query. Spot and lot columns
/// are nullable because the spot may have been deleted.
#[derive(FromRow, Debug)]
pub struct BookingRow {
    pub id: Uuid,
    pub vehicle_id: Uuid,
    pub vehicle_number: String,
    pub spot_id: Option<Uuid>,
    pub start_time: DateTime<FixedOffset>,
    pub end_time: Option<DateTime<FixedOffset>>,
    pub created_at: DateTime<FixedOffset>,
    pub spot_number: Option<i64>,
    pub spot_type: Option<String>,
    pub lot_id: Option<Uuid>,
    pub location_name: Option<String>,
    pub address: Option<String>,
    pub pin_code: Option<String>,
    pub price_per_hour: Option<f64>,
}

/// Booking as shown to drivers and admins, with placeholders for a
/// deleted spot.
#[derive(Serialize, Clone, Debug)]
pub struct BookingView {
    pub id: Uuid,
    pub vehicle_id: Uuid,
    pub vehicle_number: String,
    pub spot_id: Option<Uuid>,
    pub start_time: DateTime<FixedOffset>,
    pub end_time: Option<DateTime<FixedOffset>>,
    pub created_at: DateTime<FixedOffset>,
    pub spot_number: String,
    pub spot_type: String,
    pub lot_id: Option<Uuid>,
    pub location_name: String,
    pub address: String,
    pub pin_code: String,
    pub status: BookingStatus,
    pub price: f64,
}

impl From<BookingRow> for BookingView {
    fn from(row: BookingRow) -> Self {
        let status = if row.end_time.is_none() {
            BookingStatus::Active
        } else {
            BookingStatus::Completed
        };
        Self {
            id: row.id,
            vehicle_id: row.vehicle_id,
            vehicle_number: row.vehicle_number,
            spot_id: row.spot_id,
            start_time: row.start_time,
            end_time: row.end_time,
            created_at: row.created_at,
            spot_number: row
                .spot_number
                .map(|n| n.to_string())
                .unwrap_or_else(|| "Deleted Spot".into()),
            spot_type: row.spot_type.unwrap_or_else(|| "N/A".into()),
            lot_id: row.lot_id,
            location_name: row.location_name.unwrap_or_else(|| "Unknown".into()),
            address: row.address.unwrap_or_else(|| "Unknown Address".into()),
            pin_code: row.pin_code.unwrap_or_else(|| "Unknown".into()),
            status,
            price: row.price_per_hour.unwrap_or(0.0),
        }
    }
}

/// Admin view of the booking currently occupying a spot.
#[derive(Serialize, Clone, Debug)]
pub struct ActiveBookingView {
    pub booking_id: Uuid,
    pub spot_id: Uuid,
    pub customer_id: Uuid,
    pub vehicle_number: String,
    pub start_time: DateTime<FixedOffset>,
    pub duration_hours: i64,
    pub estimated_cost: f64,
}
