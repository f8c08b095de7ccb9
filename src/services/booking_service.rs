//! Booking manager: opening, releasing and cancelling occupancy records.
//!
//! A booking supersedes a reservation: booking with a vehicle that holds a
//! live reservation consumes that hold in the same unit of work.

use chrono::{DateTime, FixedOffset};
use sqlx::{SqliteConnection, SqlitePool};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::db::BEGIN_WRITE;
use crate::models::{
    booking::{ActiveBookingView, Booking, BookingRow, BookingView},
    caller::Caller,
    spot::SpotStatus,
};
use crate::services::{
    clock::{SharedClock, business_now},
    error::{ParkingError, ParkingResult, is_unique_violation},
    reservation_service::{find_for_vehicle, reclaim, settle_spot_hold},
    spot_store,
    vehicle_service::{find_vehicle, owned_vehicle},
};

const BOOKING_COLUMNS: &str = "id, vehicle_id, spot_id, start_time, end_time, created_at";

const BOOKING_VIEW_SELECT: &str = "SELECT b.id, b.vehicle_id, v.license_plate AS vehicle_number,
        b.spot_id, b.start_time, b.end_time, b.created_at,
        s.spot_number, s.spot_type, l.id AS lot_id, l.name AS location_name,
        l.address, l.pin_code, l.price_per_hour
    FROM bookings b
    JOIN vehicles v ON v.id = b.vehicle_id
    LEFT JOIN parking_spots s ON s.id = b.spot_id
    LEFT JOIN parking_lots l ON l.id = s.lot_id";

/// Billed hours and cost for a booking running from `start` to `now`.
///
/// Every started hour is billed, with a floor of one hour.
pub fn estimate_cost(
    start: DateTime<FixedOffset>,
    now: DateTime<FixedOffset>,
    price_per_hour: f64,
) -> (i64, f64) {
    let elapsed_ms = (now - start).num_milliseconds() as f64;
    let hours = ((elapsed_ms / 3_600_000.0).ceil() as i64).max(1);
    (hours, hours as f64 * price_per_hour)
}

async fn find_booking(conn: &mut SqliteConnection, booking_id: Uuid) -> ParkingResult<Booking> {
    sqlx::query_as::<_, Booking>(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?"
    ))
    .bind(booking_id)
    .fetch_optional(conn)
    .await?
    .ok_or(ParkingError::BookingNotFound(booking_id))
}

async fn open_booking_for_spot(
    conn: &mut SqliteConnection,
    spot_id: Uuid,
) -> ParkingResult<Option<Booking>> {
    let found = sqlx::query_as::<_, Booking>(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings WHERE spot_id = ? AND end_time IS NULL"
    ))
    .bind(spot_id)
    .fetch_optional(conn)
    .await?;
    Ok(found)
}

async fn has_open_booking_for_vehicle(
    conn: &mut SqliteConnection,
    vehicle_id: Uuid,
) -> ParkingResult<bool> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM bookings WHERE vehicle_id = ? AND end_time IS NULL",
    )
    .bind(vehicle_id)
    .fetch_one(conn)
    .await?;
    Ok(count > 0)
}

/// Load a booking and check that its vehicle belongs to the caller.
async fn owned_booking(
    conn: &mut SqliteConnection,
    caller: &Caller,
    booking_id: Uuid,
) -> ParkingResult<Booking> {
    let booking = find_booking(conn, booking_id).await?;
    let owner = find_vehicle(conn, booking.vehicle_id)
        .await?
        .map(|v| v.user_id);
    if owner != Some(caller.user_id) {
        return Err(ParkingError::Forbidden(
            "booking does not belong to the caller".into(),
        ));
    }
    Ok(booking)
}

#[derive(Clone)]
pub struct BookingManager {
    db: Arc<SqlitePool>,
    clock: SharedClock,
}

impl BookingManager {
    pub fn new(db: Arc<SqlitePool>, clock: SharedClock) -> Self {
        Self { db, clock }
    }

    fn now(&self) -> DateTime<FixedOffset> {
        business_now(&*self.clock)
    }

    /// Start a booking of `spot_id` for the caller's vehicle.
    ///
    /// Any reservation the vehicle holds is consumed: the hold row is
    /// deleted and its spot handed back before the new booking occupies
    /// the target spot.
    pub async fn book(&self, caller: &Caller, vehicle_id: Uuid, spot_id: Uuid) -> ParkingResult<Uuid> {
        let now = self.now();
        let mut tx = self.db.begin_with(BEGIN_WRITE).await?;

        let vehicle = owned_vehicle(&mut tx, caller, vehicle_id).await?;
        let spot = spot_store::fetch_spot(&mut tx, spot_id).await?;
        if spot.status == SpotStatus::Occupied {
            return Err(ParkingError::SpotOccupied);
        }
        if open_booking_for_spot(&mut tx, spot.id).await?.is_some() {
            return Err(ParkingError::SpotAlreadyBooked);
        }
        if has_open_booking_for_vehicle(&mut tx, vehicle.id).await? {
            return Err(ParkingError::VehicleAlreadyBooked);
        }

        let mut consumed = None;
        if let Some(hold) = find_for_vehicle(&mut tx, vehicle.id).await? {
            reclaim(&mut tx, &hold).await?;
            if hold.is_live(now) {
                consumed = Some(hold.id);
            }
        }

        // Another vehicle's live hold keeps the spot; an expired one is reclaimed here.
        match settle_spot_hold(&mut tx, spot.id, now).await? {
            SpotStatus::Available => {}
            SpotStatus::Reserved => return Err(ParkingError::SpotReserved),
            SpotStatus::Occupied => return Err(ParkingError::SpotOccupied),
        }

        let booking = Booking {
            id: Uuid::new_v4(),
            vehicle_id: vehicle.id,
            spot_id: Some(spot.id),
            start_time: now,
            end_time: None,
            created_at: now,
        };
        let inserted = sqlx::query(
            "INSERT INTO bookings (id, vehicle_id, spot_id, start_time, end_time, created_at)
             VALUES (?, ?, ?, ?, NULL, ?)",
        )
        .bind(booking.id)
        .bind(booking.vehicle_id)
        .bind(booking.spot_id)
        .bind(booking.start_time)
        .bind(booking.created_at)
        .execute(&mut *tx)
        .await;
        match inserted {
            Ok(_) => {}
            Err(err) if is_unique_violation(&err) => return Err(ParkingError::SpotAlreadyBooked),
            Err(err) => return Err(ParkingError::Sqlx(err)),
        }

        if !spot_store::transition(&mut tx, spot.id, SpotStatus::Available, SpotStatus::Occupied)
            .await?
        {
            return Err(ParkingError::SpotOccupied);
        }
        tx.commit().await?;

        info!(
            booking_id = %booking.id,
            vehicle_id = %vehicle.id,
            spot_id = %spot.id,
            consumed_reservation = ?consumed,
            "booking started"
        );
        Ok(booking.id)
    }

    /// Complete an active booking and free its spot. Returns the end time.
    pub async fn release(&self, caller: &Caller, booking_id: Uuid) -> ParkingResult<DateTime<FixedOffset>> {
        let now = self.now();
        let mut tx = self.db.begin_with(BEGIN_WRITE).await?;

        let booking = owned_booking(&mut tx, caller, booking_id).await?;
        if !booking.is_active() {
            return Err(ParkingError::AlreadyCompleted);
        }

        sqlx::query("UPDATE bookings SET end_time = ? WHERE id = ? AND end_time IS NULL")
            .bind(now)
            .bind(booking.id)
            .execute(&mut *tx)
            .await?;
        if let Some(spot_id) = booking.spot_id {
            spot_store::transition(&mut tx, spot_id, SpotStatus::Occupied, SpotStatus::Available)
                .await?;
        }
        tx.commit().await?;

        info!(booking_id = %booking.id, end_time = %now, "booking released");
        Ok(now)
    }

    /// Undo a booking: the row is deleted outright. The spot is handed
    /// back only if this booking was still holding it.
    pub async fn cancel(&self, caller: &Caller, booking_id: Uuid) -> ParkingResult<()> {
        let mut tx = self.db.begin_with(BEGIN_WRITE).await?;

        let booking = owned_booking(&mut tx, caller, booking_id).await?;
        sqlx::query("DELETE FROM bookings WHERE id = ?")
            .bind(booking.id)
            .execute(&mut *tx)
            .await?;
        if let (true, Some(spot_id)) = (booking.is_active(), booking.spot_id) {
            spot_store::transition(&mut tx, spot_id, SpotStatus::Occupied, SpotStatus::Available)
                .await?;
        }
        tx.commit().await?;

        info!(booking_id = %booking.id, was_active = booking.is_active(), "booking cancelled");
        Ok(())
    }

    /// Bookings of the caller's vehicles, optionally narrowed to one.
    pub async fn list_for_vehicle(
        &self,
        caller: &Caller,
        vehicle_id: Option<Uuid>,
    ) -> ParkingResult<Vec<BookingView>> {
        let mut conn = self.db.acquire().await?;
        if let Some(vehicle_id) = vehicle_id {
            owned_vehicle(&mut conn, caller, vehicle_id).await?;
        }
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "{BOOKING_VIEW_SELECT}
             WHERE v.user_id = ? AND (? IS NULL OR b.vehicle_id = ?)
             ORDER BY b.start_time DESC"
        ))
        .bind(caller.user_id)
        .bind(vehicle_id)
        .bind(vehicle_id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows.into_iter().map(BookingView::from).collect())
    }

    /// Every booking in the system (admin).
    pub async fn list_all(&self) -> ParkingResult<Vec<BookingView>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "{BOOKING_VIEW_SELECT} ORDER BY b.start_time DESC"
        ))
        .fetch_all(&*self.db)
        .await?;
        Ok(rows.into_iter().map(BookingView::from).collect())
    }

    /// The booking currently occupying a spot, with its running cost.
    pub async fn active_booking_for_spot(
        &self,
        lot_id: Uuid,
        spot_number: i64,
    ) -> ParkingResult<ActiveBookingView> {
        let now = self.now();
        let mut conn = self.db.acquire().await?;

        let spot = spot_store::fetch_spot_by_number(&mut conn, lot_id, spot_number).await?;
        if spot.status != SpotStatus::Occupied {
            return Err(ParkingError::SpotNotOccupied);
        }
        let booking = open_booking_for_spot(&mut conn, spot.id)
            .await?
            .ok_or(ParkingError::NoActiveBooking)?;
        let vehicle = find_vehicle(&mut conn, booking.vehicle_id)
            .await?
            .ok_or(ParkingError::VehicleNotFound(booking.vehicle_id))?;
        let price: f64 = sqlx::query_scalar("SELECT price_per_hour FROM parking_lots WHERE id = ?")
            .bind(spot.lot_id)
            .fetch_one(&mut *conn)
            .await?;

        let (duration_hours, estimated_cost) = estimate_cost(booking.start_time, now, price);
        Ok(ActiveBookingView {
            booking_id: booking.id,
            spot_id: spot.id,
            customer_id: vehicle.user_id,
            vehicle_number: vehicle.license_plate,
            start_time: booking.start_time,
            duration_hours,
            estimated_cost,
        })
    }
}
