//! Reservation manager: 30-minute holds on a spot, their cancellation and
//! the sweep that reclaims expired holds.
//!
//! Liveness is decided in one place, [`Reservation::is_live`]. The sweep
//! and the lazy checks on the reserve and book paths all call it, so an
//! expired hold that the sweep has not reached yet never blocks anyone.

use chrono::{DateTime, FixedOffset};
use sqlx::{SqliteConnection, SqlitePool};
use std::{collections::HashSet, sync::Arc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::BEGIN_WRITE;
use crate::models::{
    caller::Caller,
    reservation::{Reservation, ReservationReceipt, ReservationView},
    spot::{ParkingSpot, SpotStatus},
};
use crate::services::{
    clock::{SharedClock, business_now},
    error::{ParkingError, ParkingResult},
    spot_store,
    vehicle_service::owned_vehicle,
};

const RESERVATION_COLUMNS: &str = "id, vehicle_id, spot_id, created_at, expires_at";

pub(crate) async fn find_for_vehicle(
    conn: &mut SqliteConnection,
    vehicle_id: Uuid,
) -> ParkingResult<Option<Reservation>> {
    let found = sqlx::query_as::<_, Reservation>(&format!(
        "SELECT {RESERVATION_COLUMNS} FROM reservations WHERE vehicle_id = ?"
    ))
    .bind(vehicle_id)
    .fetch_optional(conn)
    .await?;
    Ok(found)
}

pub(crate) async fn find_for_spot(
    conn: &mut SqliteConnection,
    spot_id: Uuid,
) -> ParkingResult<Option<Reservation>> {
    let found = sqlx::query_as::<_, Reservation>(&format!(
        "SELECT {RESERVATION_COLUMNS} FROM reservations WHERE spot_id = ?"
    ))
    .bind(spot_id)
    .fetch_optional(conn)
    .await?;
    Ok(found)
}

/// Delete a hold and hand its spot back.
///
/// The spot is only reset while it is still `reserved`; a missing spot is
/// not an error.
pub(crate) async fn reclaim(conn: &mut SqliteConnection, reservation: &Reservation) -> ParkingResult<()> {
    sqlx::query("DELETE FROM reservations WHERE id = ?")
        .bind(reservation.id)
        .execute(&mut *conn)
        .await?;
    let reset = spot_store::transition(
        conn,
        reservation.spot_id,
        SpotStatus::Reserved,
        SpotStatus::Available,
    )
    .await?;
    if !reset {
        debug!(spot_id = %reservation.spot_id, "spot already moved on or deleted, left as is");
    }
    Ok(())
}

/// Resolve the true status of the spot at `now`.
///
/// A `reserved` spot whose hold has expired (or whose hold row is gone) is
/// reclaimed on the spot and reported as `available`.
pub(crate) async fn settle_spot_hold(
    conn: &mut SqliteConnection,
    spot_id: Uuid,
    now: DateTime<FixedOffset>,
) -> ParkingResult<SpotStatus> {
    let status = spot_store::get_status(conn, spot_id).await?;
    if status != SpotStatus::Reserved {
        return Ok(status);
    }
    match find_for_spot(conn, spot_id).await? {
        Some(hold) if hold.is_live(now) => Ok(SpotStatus::Reserved),
        Some(stale) => {
            reclaim(conn, &stale).await?;
            debug!(reservation_id = %stale.id, "reclaimed expired hold on read");
            Ok(SpotStatus::Available)
        }
        None => {
            spot_store::set_status(conn, spot_id, SpotStatus::Available).await?;
            Ok(SpotStatus::Available)
        }
    }
}

/// Spots of a lot as they stand at `now`, for read paths.
///
/// A `reserved` spot without a live hold is reported `available`. Nothing
/// is written; the sweep or the next write path reclaims the hold.
pub(crate) async fn spots_as_of(
    conn: &mut SqliteConnection,
    lot_id: Uuid,
    now: DateTime<FixedOffset>,
) -> ParkingResult<Vec<ParkingSpot>> {
    let holds = sqlx::query_as::<_, Reservation>(&format!(
        "SELECT {RESERVATION_COLUMNS} FROM reservations \
         WHERE spot_id IN (SELECT id FROM parking_spots WHERE lot_id = ?)"
    ))
    .bind(lot_id)
    .fetch_all(&mut *conn)
    .await?;
    let held: HashSet<Uuid> = holds
        .iter()
        .filter(|hold| hold.is_live(now))
        .map(|hold| hold.spot_id)
        .collect();

    let mut spots = spot_store::spots_in_lot(conn, lot_id).await?;
    for spot in &mut spots {
        if spot.status == SpotStatus::Reserved && !held.contains(&spot.id) {
            spot.status = SpotStatus::Available;
        }
    }
    Ok(spots)
}

/// Single-spot form of [`spots_as_of`].
pub(crate) async fn spot_as_of(
    conn: &mut SqliteConnection,
    mut spot: ParkingSpot,
    now: DateTime<FixedOffset>,
) -> ParkingResult<ParkingSpot> {
    if spot.status == SpotStatus::Reserved {
        let live = find_for_spot(conn, spot.id)
            .await?
            .is_some_and(|hold| hold.is_live(now));
        if !live {
            spot.status = SpotStatus::Available;
        }
    }
    Ok(spot)
}

#[derive(Clone)]
pub struct ReservationManager {
    db: Arc<SqlitePool>,
    clock: SharedClock,
}

impl ReservationManager {
    pub fn new(db: Arc<SqlitePool>, clock: SharedClock) -> Self {
        Self { db, clock }
    }

    fn now(&self) -> DateTime<FixedOffset> {
        business_now(&*self.clock)
    }

    /// Place a 30-minute hold on an available spot.
    pub async fn reserve(
        &self,
        caller: &Caller,
        vehicle_id: Uuid,
        spot_id: Uuid,
    ) -> ParkingResult<ReservationReceipt> {
        let now = self.now();
        let mut tx = self.db.begin_with(BEGIN_WRITE).await?;

        let vehicle = owned_vehicle(&mut tx, caller, vehicle_id).await?;
        let spot = spot_store::fetch_spot(&mut tx, spot_id).await?;
        if settle_spot_hold(&mut tx, spot.id, now).await? != SpotStatus::Available {
            return Err(ParkingError::SpotUnavailable);
        }

        if let Some(existing) = find_for_vehicle(&mut tx, vehicle.id).await? {
            if existing.is_live(now) {
                return Err(ParkingError::VehicleAlreadyReserved);
            }
            reclaim(&mut tx, &existing).await?;
        }

        let reservation = Reservation {
            id: Uuid::new_v4(),
            vehicle_id: vehicle.id,
            spot_id: spot.id,
            created_at: now,
            expires_at: Reservation::expiry_for(now),
        };
        sqlx::query(
            "INSERT INTO reservations (id, vehicle_id, spot_id, created_at, expires_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(reservation.id)
        .bind(reservation.vehicle_id)
        .bind(reservation.spot_id)
        .bind(reservation.created_at)
        .bind(reservation.expires_at)
        .execute(&mut *tx)
        .await?;

        if !spot_store::transition(&mut tx, spot.id, SpotStatus::Available, SpotStatus::Reserved)
            .await?
        {
            return Err(ParkingError::SpotUnavailable);
        }
        tx.commit().await?;

        info!(
            reservation_id = %reservation.id,
            vehicle_id = %reservation.vehicle_id,
            spot_id = %reservation.spot_id,
            expires_at = %reservation.expires_at,
            "spot reserved"
        );
        Ok(ReservationReceipt {
            reservation_id: reservation.id,
            expires_at: reservation.expires_at,
        })
    }

    /// Drop the vehicle's live hold and free its spot.
    pub async fn cancel(&self, caller: &Caller, vehicle_id: Uuid) -> ParkingResult<()> {
        let now = self.now();
        let mut tx = self.db.begin_with(BEGIN_WRITE).await?;

        let vehicle = owned_vehicle(&mut tx, caller, vehicle_id).await?;
        let hold = find_for_vehicle(&mut tx, vehicle.id)
            .await?
            .filter(|r| r.is_live(now))
            .ok_or(ParkingError::NoActiveReservation)?;

        reclaim(&mut tx, &hold).await?;
        tx.commit().await?;

        info!(reservation_id = %hold.id, vehicle_id = %vehicle.id, "reservation cancelled");
        Ok(())
    }

    /// Live holds of the caller's vehicles, optionally narrowed to one
    /// vehicle. Never mutates anything.
    pub async fn list_active(
        &self,
        caller: &Caller,
        vehicle_id: Option<Uuid>,
    ) -> ParkingResult<Vec<ReservationView>> {
        let now = self.now();
        let mut conn = self.db.acquire().await?;
        if let Some(vehicle_id) = vehicle_id {
            owned_vehicle(&mut conn, caller, vehicle_id).await?;
        }

        let rows = sqlx::query_as::<_, ReservationView>(
            "SELECT r.id, r.vehicle_id, v.license_plate, r.spot_id, s.spot_number, s.lot_id,
                    l.name AS location_name, r.created_at, r.expires_at
             FROM reservations r
             JOIN vehicles v ON v.id = r.vehicle_id
             JOIN parking_spots s ON s.id = r.spot_id
             JOIN parking_lots l ON l.id = s.lot_id
             WHERE v.user_id = ? AND (? IS NULL OR r.vehicle_id = ?)
             ORDER BY r.created_at ASC",
        )
        .bind(caller.user_id)
        .bind(vehicle_id)
        .bind(vehicle_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows.into_iter().filter(|r| r.is_live(now)).collect())
    }

    /// Reclaim every hold that has expired. Returns how many were
    /// reclaimed by this pass.
    ///
    /// Each hold is reclaimed in its own unit of work and re-read first, so
    /// a hold consumed by a booking in between is skipped rather than
    /// reclaimed twice. One failure is logged and the pass carries on.
    pub async fn sweep_expired(&self) -> ParkingResult<usize> {
        let now = self.now();
        let candidates = sqlx::query_as::<_, Reservation>(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations"
        ))
        .fetch_all(&*self.db)
        .await?;

        let mut reclaimed = 0;
        for hold in candidates.into_iter().filter(|r| !r.is_live(now)) {
            match self.reclaim_if_expired(hold.id, now).await {
                Ok(true) => reclaimed += 1,
                Ok(false) => debug!(reservation_id = %hold.id, "hold already gone"),
                Err(err) => warn!(reservation_id = %hold.id, error = %err, "failed to reclaim hold"),
            }
        }

        if reclaimed > 0 {
            info!(count = reclaimed, "reclaimed expired reservations");
        }
        Ok(reclaimed)
    }

    async fn reclaim_if_expired(
        &self,
        reservation_id: Uuid,
        now: DateTime<FixedOffset>,
    ) -> ParkingResult<bool> {
        let mut tx = self.db.begin_with(BEGIN_WRITE).await?;
        let current = sqlx::query_as::<_, Reservation>(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations WHERE id = ?"
        ))
        .bind(reservation_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(hold) = current.filter(|r| !r.is_live(now)) else {
            return Ok(false);
        };
        reclaim(&mut tx, &hold).await?;
        tx.commit().await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{driver, fixture_clock, test_pool};
    use crate::models::{lot::NewLot, vehicle::VehicleInput};
    use crate::services::{lot_service::LotProvisioner, vehicle_service::VehicleRegistry};

    struct Fixture {
        pool: Arc<SqlitePool>,
        clock: Arc<crate::db::test_support::ManualClock>,
        reservations: ReservationManager,
        caller: Caller,
        vehicle_id: Uuid,
        spots: Vec<Uuid>,
    }

    async fn fixture() -> Fixture {
        let pool = test_pool().await;
        let (clock, shared) = fixture_clock();
        let lots = LotProvisioner::new(pool.clone());
        let lot = lots
            .create_lot(NewLot {
                name: "Central".into(),
                address: "1 MG Road".into(),
                price_per_hour: 20.0,
                pin_code: "560001".into(),
                spot_count: 3,
            })
            .await
            .unwrap();
        let spots = lots
            .lot_summary(lot.id)
            .await
            .unwrap()
            .spots
            .into_iter()
            .map(|s| s.spot_id)
            .collect();
        let caller = driver();
        let vehicle = VehicleRegistry::new(pool.clone())
            .register(
                &caller,
                VehicleInput {
                    license_plate: "KA01AB1234".into(),
                    vehicle_type: "car".into(),
                },
            )
            .await
            .unwrap();
        Fixture {
            reservations: ReservationManager::new(pool.clone(), shared),
            pool,
            clock,
            caller,
            vehicle_id: vehicle.id,
            spots,
        }
    }

    async fn status(pool: &SqlitePool, spot_id: Uuid) -> SpotStatus {
        let mut conn = pool.acquire().await.unwrap();
        spot_store::get_status(&mut conn, spot_id).await.unwrap()
    }

    #[tokio::test]
    async fn reserve_holds_spot_for_thirty_minutes() {
        let f = fixture().await;
        let receipt = f
            .reservations
            .reserve(&f.caller, f.vehicle_id, f.spots[0])
            .await
            .unwrap();

        let now = business_now(&*f.clock);
        assert_eq!(receipt.expires_at, Reservation::expiry_for(now));
        assert_eq!(status(&f.pool, f.spots[0]).await, SpotStatus::Reserved);
    }

    #[tokio::test]
    async fn reserved_spot_is_unavailable_and_vehicle_limited_to_one_hold() {
        let f = fixture().await;
        f.reservations
            .reserve(&f.caller, f.vehicle_id, f.spots[0])
            .await
            .unwrap();

        let err = f
            .reservations
            .reserve(&f.caller, f.vehicle_id, f.spots[0])
            .await
            .unwrap_err();
        assert!(matches!(err, ParkingError::SpotUnavailable));

        let err = f
            .reservations
            .reserve(&f.caller, f.vehicle_id, f.spots[1])
            .await
            .unwrap_err();
        assert!(matches!(err, ParkingError::VehicleAlreadyReserved));
        assert_eq!(status(&f.pool, f.spots[1]).await, SpotStatus::Available);
    }

    #[tokio::test]
    async fn expired_hold_does_not_block_a_new_one() {
        let f = fixture().await;
        f.reservations
            .reserve(&f.caller, f.vehicle_id, f.spots[0])
            .await
            .unwrap();
        f.clock.advance_minutes(31);

        f.reservations
            .reserve(&f.caller, f.vehicle_id, f.spots[1])
            .await
            .unwrap();
        assert_eq!(status(&f.pool, f.spots[0]).await, SpotStatus::Available);
        assert_eq!(status(&f.pool, f.spots[1]).await, SpotStatus::Reserved);
    }

    #[tokio::test]
    async fn cancel_frees_the_spot() {
        let f = fixture().await;
        f.reservations
            .reserve(&f.caller, f.vehicle_id, f.spots[2])
            .await
            .unwrap();
        f.reservations.cancel(&f.caller, f.vehicle_id).await.unwrap();

        assert_eq!(status(&f.pool, f.spots[2]).await, SpotStatus::Available);
        let err = f.reservations.cancel(&f.caller, f.vehicle_id).await.unwrap_err();
        assert!(matches!(err, ParkingError::NoActiveReservation));
    }

    #[tokio::test]
    async fn cancel_by_stranger_is_forbidden() {
        let f = fixture().await;
        f.reservations
            .reserve(&f.caller, f.vehicle_id, f.spots[0])
            .await
            .unwrap();
        let err = f.reservations.cancel(&driver(), f.vehicle_id).await.unwrap_err();
        assert!(matches!(err, ParkingError::Forbidden(_)));
        assert_eq!(status(&f.pool, f.spots[0]).await, SpotStatus::Reserved);
    }

    #[tokio::test]
    async fn list_active_hides_expired_holds() {
        let f = fixture().await;
        f.reservations
            .reserve(&f.caller, f.vehicle_id, f.spots[0])
            .await
            .unwrap();

        let listed = f
            .reservations
            .list_active(&f.caller, Some(f.vehicle_id))
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].spot_number, 1);

        f.clock.advance_minutes(30);
        assert!(f.reservations.list_active(&f.caller, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sweep_is_idempotent() {
        let f = fixture().await;
        f.reservations
            .reserve(&f.caller, f.vehicle_id, f.spots[0])
            .await
            .unwrap();

        assert_eq!(f.reservations.sweep_expired().await.unwrap(), 0);
        f.clock.advance_minutes(31);
        assert_eq!(f.reservations.sweep_expired().await.unwrap(), 1);
        assert_eq!(status(&f.pool, f.spots[0]).await, SpotStatus::Available);
        assert_eq!(f.reservations.sweep_expired().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn concurrent_reserves_leave_one_winner() {
        let f = fixture().await;
        let a = f.reservations.clone();
        let b = f.reservations.clone();
        let (caller, vehicle, s0, s1) = (f.caller, f.vehicle_id, f.spots[0], f.spots[1]);

        let (ra, rb) = tokio::join!(
            async move { a.reserve(&caller, vehicle, s0).await },
            async move { b.reserve(&caller, vehicle, s1).await },
        );
        assert_eq!(ra.is_ok() as u8 + rb.is_ok() as u8, 1);
        let loser = ra.err().or(rb.err()).unwrap();
        assert!(matches!(loser, ParkingError::VehicleAlreadyReserved));
    }
}
