//! Lot and spot provisioning.
//!
//! Creating a lot creates its spots `1..=N`. Changing the spot count
//! deletes every spot of the lot and recreates `1..=N` fresh, which drops
//! spot types and any holds on the old spots. Bookings that pointed at a
//! removed spot keep their history with a null spot.

use mockable::DefaultClock;
use sqlx::{SqliteConnection, SqlitePool};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::db::BEGIN_WRITE;
use crate::models::{
    lot::{LotOverview, LotSummary, LotUpdate, NewLot, ParkingLot, SpotCounts, SpotLine},
    spot::{DEFAULT_SPOT_TYPE, ParkingSpot, SpotStatus, SpotUpdate},
};
use crate::services::{
    clock::{SharedClock, business_now},
    error::{ParkingError, ParkingResult, is_unique_violation},
    reservation_service::{find_for_spot, spot_as_of, spots_as_of},
    spot_store,
};

const LOT_COLUMNS: &str = "id, name, address, price_per_hour, pin_code, spot_count";

async fn fetch_lot(conn: &mut SqliteConnection, lot_id: Uuid) -> ParkingResult<ParkingLot> {
    sqlx::query_as::<_, ParkingLot>(&format!(
        "SELECT {LOT_COLUMNS} FROM parking_lots WHERE id = ?"
    ))
    .bind(lot_id)
    .fetch_optional(conn)
    .await?
    .ok_or(ParkingError::LotNotFound(lot_id))
}

async fn address_taken(
    conn: &mut SqliteConnection,
    address: &str,
    except: Option<Uuid>,
) -> ParkingResult<bool> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM parking_lots WHERE address = ? AND (? IS NULL OR id != ?)",
    )
    .bind(address)
    .bind(except)
    .bind(except)
    .fetch_one(conn)
    .await?;
    Ok(count > 0)
}

async fn create_spots(conn: &mut SqliteConnection, lot_id: Uuid, count: i64) -> ParkingResult<()> {
    for number in 1..=count {
        sqlx::query(
            "INSERT INTO parking_spots (id, lot_id, spot_number, spot_type, is_occupied, status)
             VALUES (?, ?, ?, ?, 0, ?)",
        )
        .bind(Uuid::new_v4())
        .bind(lot_id)
        .bind(number)
        .bind(DEFAULT_SPOT_TYPE)
        .bind(SpotStatus::Available)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

fn validate_text(field: &str, value: &str) -> ParkingResult<()> {
    if value.trim().is_empty() {
        return Err(ParkingError::InvalidInput(format!("{field} is required")));
    }
    Ok(())
}

fn validate_price(price: f64) -> ParkingResult<()> {
    if !price.is_finite() || price < 0.0 {
        return Err(ParkingError::InvalidInput(
            "price must be a non-negative number".into(),
        ));
    }
    Ok(())
}

#[derive(Clone)]
pub struct LotProvisioner {
    db: Arc<SqlitePool>,
    clock: SharedClock,
}

impl LotProvisioner {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self {
            db,
            clock: Arc::new(DefaultClock),
        }
    }

    /// Clock used to tell live holds from expired ones.
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    pub async fn create_lot(&self, new: NewLot) -> ParkingResult<ParkingLot> {
        if new.spot_count <= 0 {
            return Err(ParkingError::InvalidSpotCount);
        }
        validate_text("name", &new.name)?;
        validate_text("address", &new.address)?;
        validate_text("pin code", &new.pin_code)?;
        validate_price(new.price_per_hour)?;

        let mut tx = self.db.begin_with(BEGIN_WRITE).await?;
        if address_taken(&mut tx, &new.address, None).await? {
            return Err(ParkingError::DuplicateAddress(new.address));
        }

        let lot = ParkingLot {
            id: Uuid::new_v4(),
            name: new.name,
            address: new.address,
            price_per_hour: new.price_per_hour,
            pin_code: new.pin_code,
            spot_count: new.spot_count,
        };
        sqlx::query(
            "INSERT INTO parking_lots (id, name, address, price_per_hour, pin_code, spot_count)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(lot.id)
        .bind(&lot.name)
        .bind(&lot.address)
        .bind(lot.price_per_hour)
        .bind(&lot.pin_code)
        .bind(lot.spot_count)
        .execute(&mut *tx)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                ParkingError::DuplicateAddress(lot.address.clone())
            } else {
                ParkingError::Sqlx(err)
            }
        })?;
        create_spots(&mut tx, lot.id, lot.spot_count).await?;
        tx.commit().await?;

        info!(lot_id = %lot.id, spots = lot.spot_count, "parking lot created");
        Ok(lot)
    }

    /// Apply a partial update.
    ///
    /// Renaming, moving or resizing a lot with an occupied spot fails
    /// HasOccupiedSpots; a price change alone is always allowed.
    pub async fn update_lot(&self, lot_id: Uuid, update: LotUpdate) -> ParkingResult<ParkingLot> {
        if update.spot_count.is_some_and(|c| c <= 0) {
            return Err(ParkingError::InvalidSpotCount);
        }
        for (field, value) in [
            ("name", &update.name),
            ("address", &update.address),
            ("pin code", &update.pin_code),
        ] {
            if let Some(value) = value {
                validate_text(field, value)?;
            }
        }
        if let Some(price) = update.price_per_hour {
            validate_price(price)?;
        }

        let mut tx = self.db.begin_with(BEGIN_WRITE).await?;
        let mut lot = fetch_lot(&mut tx, lot_id).await?;

        if update.changes_identity_of(&lot)
            && spot_store::count_by_lot_and_status(&mut tx, lot.id, SpotStatus::Occupied).await? > 0
        {
            return Err(ParkingError::HasOccupiedSpots);
        }
        if let Some(address) = &update.address {
            if address_taken(&mut tx, address, Some(lot.id)).await? {
                return Err(ParkingError::DuplicateAddress(address.clone()));
            }
        }
        let resize = update.resizes(&lot);

        if let Some(name) = update.name {
            lot.name = name;
        }
        if let Some(address) = update.address {
            lot.address = address;
        }
        if let Some(pin_code) = update.pin_code {
            lot.pin_code = pin_code;
        }
        if let Some(price) = update.price_per_hour {
            lot.price_per_hour = price;
        }
        if let Some(count) = update.spot_count {
            lot.spot_count = count;
        }

        let result = sqlx::query(
            "UPDATE parking_lots SET name = ?, address = ?, price_per_hour = ?, pin_code = ?,
                    spot_count = ?
             WHERE id = ?",
        )
        .bind(&lot.name)
        .bind(&lot.address)
        .bind(lot.price_per_hour)
        .bind(&lot.pin_code)
        .bind(lot.spot_count)
        .bind(lot.id)
        .execute(&mut *tx)
        .await;
        match result {
            Ok(_) => {}
            Err(err) if is_unique_violation(&err) => {
                return Err(ParkingError::DuplicateAddress(lot.address));
            }
            Err(err) => return Err(ParkingError::Sqlx(err)),
        }

        if resize {
            sqlx::query("DELETE FROM parking_spots WHERE lot_id = ?")
                .bind(lot.id)
                .execute(&mut *tx)
                .await?;
            create_spots(&mut tx, lot.id, lot.spot_count).await?;
        }
        tx.commit().await?;

        info!(lot_id = %lot.id, spots = lot.spot_count, resized = resize, "parking lot updated");
        Ok(lot)
    }

    /// Delete a lot and, by cascade, its spots and their holds.
    pub async fn delete_lot(&self, lot_id: Uuid) -> ParkingResult<()> {
        let mut tx = self.db.begin_with(BEGIN_WRITE).await?;
        let lot = fetch_lot(&mut tx, lot_id).await?;
        if spot_store::count_by_lot_and_status(&mut tx, lot.id, SpotStatus::Occupied).await? > 0 {
            return Err(ParkingError::HasOccupiedSpots);
        }
        sqlx::query("DELETE FROM parking_lots WHERE id = ?")
            .bind(lot.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(lot_id = %lot.id, "parking lot deleted");
        Ok(())
    }

    pub async fn get_lot(&self, lot_id: Uuid) -> ParkingResult<ParkingLot> {
        let mut conn = self.db.acquire().await?;
        fetch_lot(&mut conn, lot_id).await
    }

    /// Every lot with its live counters.
    pub async fn list_lots(&self) -> ParkingResult<Vec<LotOverview>> {
        let mut conn = self.db.acquire().await?;
        let lots = sqlx::query_as::<_, ParkingLot>(&format!(
            "SELECT {LOT_COLUMNS} FROM parking_lots ORDER BY name ASC"
        ))
        .fetch_all(&mut *conn)
        .await?;

        let now = business_now(self.clock.as_ref());
        let mut overviews = Vec::with_capacity(lots.len());
        for lot in lots {
            let spots = spots_as_of(&mut conn, lot.id, now).await?;
            let counts = SpotCounts::tally(spots.iter().map(|s| &s.status));
            overviews.push(LotOverview { lot, counts });
        }
        Ok(overviews)
    }

    pub async fn lot_summary(&self, lot_id: Uuid) -> ParkingResult<LotSummary> {
        let mut conn = self.db.acquire().await?;
        let lot = fetch_lot(&mut conn, lot_id).await?;
        let spots = spots_as_of(&mut conn, lot.id, business_now(self.clock.as_ref())).await?;
        let counts = SpotCounts::tally(spots.iter().map(|s| &s.status));
        let spots = spots
            .into_iter()
            .map(|s| SpotLine {
                spot_id: s.id,
                spot_number: s.spot_number,
                spot_type: s.spot_type,
                is_occupied: s.is_occupied,
                status: s.status,
            })
            .collect();
        Ok(LotSummary { lot, counts, spots })
    }

    pub async fn get_spot(&self, lot_id: Uuid, spot_number: i64) -> ParkingResult<ParkingSpot> {
        let mut conn = self.db.acquire().await?;
        let spot = spot_store::fetch_spot_by_number(&mut conn, lot_id, spot_number).await?;
        spot_as_of(&mut conn, spot, business_now(self.clock.as_ref())).await
    }

    /// Delete a single spot. Occupied spots and spots under a live hold
    /// stay; an expired hold goes with the spot.
    pub async fn delete_spot(&self, lot_id: Uuid, spot_number: i64) -> ParkingResult<()> {
        let now = business_now(self.clock.as_ref());
        let mut tx = self.db.begin_with(BEGIN_WRITE).await?;
        let spot = spot_store::fetch_spot_by_number(&mut tx, lot_id, spot_number).await?;
        if spot.is_occupied {
            return Err(ParkingError::SpotOccupied);
        }
        if let Some(hold) = find_for_spot(&mut tx, spot.id).await? {
            if hold.is_live(now) {
                return Err(ParkingError::SpotReserved);
            }
        }
        sqlx::query("DELETE FROM parking_spots WHERE id = ?")
            .bind(spot.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(lot_id = %lot_id, spot_number, "parking spot deleted");
        Ok(())
    }

    /// Partial spot update. The occupancy flag is written through the spot
    /// store so flag and status stay in step. Clearing the flag only frees
    /// an occupied spot; a reserved spot keeps its hold.
    pub async fn update_spot(
        &self,
        lot_id: Uuid,
        spot_number: i64,
        update: SpotUpdate,
    ) -> ParkingResult<ParkingSpot> {
        let mut tx = self.db.begin_with(BEGIN_WRITE).await?;
        let spot = spot_store::fetch_spot_by_number(&mut tx, lot_id, spot_number).await?;

        if let Some(spot_type) = &update.spot_type {
            validate_text("spot type", spot_type)?;
            sqlx::query("UPDATE parking_spots SET spot_type = ? WHERE id = ?")
                .bind(spot_type)
                .bind(spot.id)
                .execute(&mut *tx)
                .await?;
        }
        if let Some(occupied) = update.is_occupied {
            let status = match (occupied, spot.status) {
                (true, _) => SpotStatus::Occupied,
                (false, SpotStatus::Occupied) => SpotStatus::Available,
                (false, unchanged) => unchanged,
            };
            if status != spot.status {
                spot_store::set_status(&mut tx, spot.id, status).await?;
            }
        }
        let spot = spot_store::fetch_spot(&mut tx, spot.id).await?;
        tx.commit().await?;

        info!(lot_id = %lot_id, spot_number, "parking spot updated");
        Ok(spot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{driver, fixture_clock, test_pool};
    use crate::models::vehicle::VehicleInput;
    use crate::services::{
        booking_service::BookingManager, reservation_service::ReservationManager,
        vehicle_service::VehicleRegistry,
    };

    fn new_lot(address: &str, spots: i64) -> NewLot {
        NewLot {
            name: "Central".into(),
            address: address.into(),
            price_per_hour: 20.0,
            pin_code: "560001".into(),
            spot_count: spots,
        }
    }

    #[tokio::test]
    async fn create_lot_numbers_spots_from_one() {
        let lots = LotProvisioner::new(test_pool().await);
        let lot = lots.create_lot(new_lot("1 MG Road", 4)).await.unwrap();

        let summary = lots.lot_summary(lot.id).await.unwrap();
        let numbers: Vec<i64> = summary.spots.iter().map(|s| s.spot_number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
        assert!(summary.spots.iter().all(|s| s.spot_type == "compact"));
        assert_eq!(summary.counts.available, 4);
    }

    #[tokio::test]
    async fn create_lot_rejects_bad_count_and_duplicate_address() {
        let lots = LotProvisioner::new(test_pool().await);
        let err = lots.create_lot(new_lot("1 MG Road", 0)).await.unwrap_err();
        assert!(matches!(err, ParkingError::InvalidSpotCount));

        lots.create_lot(new_lot("1 MG Road", 2)).await.unwrap();
        let err = lots.create_lot(new_lot("1 MG Road", 2)).await.unwrap_err();
        assert!(matches!(err, ParkingError::DuplicateAddress(_)));
        assert_eq!(lots.list_lots().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn occupied_spot_blocks_delete_and_resize_but_not_price() {
        let pool = test_pool().await;
        let (_, clock) = fixture_clock();
        let lots = LotProvisioner::new(pool.clone());
        let lot = lots.create_lot(new_lot("1 MG Road", 2)).await.unwrap();
        let alice = driver();
        let car = VehicleRegistry::new(pool.clone())
            .register(
                &alice,
                VehicleInput {
                    license_plate: "KA01AB0001".into(),
                    vehicle_type: "car".into(),
                },
            )
            .await
            .unwrap();
        let spot = lots.get_spot(lot.id, 1).await.unwrap();
        BookingManager::new(pool.clone(), clock)
            .book(&alice, car.id, spot.id)
            .await
            .unwrap();

        let err = lots.delete_lot(lot.id).await.unwrap_err();
        assert!(matches!(err, ParkingError::HasOccupiedSpots));
        let resize = LotUpdate {
            spot_count: Some(5),
            ..LotUpdate::default()
        };
        let err = lots.update_lot(lot.id, resize).await.unwrap_err();
        assert!(matches!(err, ParkingError::HasOccupiedSpots));
        let err = lots.delete_spot(lot.id, 1).await.unwrap_err();
        assert!(matches!(err, ParkingError::SpotOccupied));

        let reprice = LotUpdate {
            price_per_hour: Some(30.0),
            ..LotUpdate::default()
        };
        let updated = lots.update_lot(lot.id, reprice).await.unwrap();
        assert_eq!(updated.price_per_hour, 30.0);
        assert_eq!(lots.lot_summary(lot.id).await.unwrap().counts.occupied, 1);
    }

    #[tokio::test]
    async fn reserved_spots_do_not_block_resize_or_delete() {
        let pool = test_pool().await;
        let (_, clock) = fixture_clock();
        let lots = LotProvisioner::new(pool.clone()).with_clock(clock.clone());
        let lot = lots.create_lot(new_lot("1 MG Road", 2)).await.unwrap();
        let alice = driver();
        let car = VehicleRegistry::new(pool.clone())
            .register(
                &alice,
                VehicleInput {
                    license_plate: "KA01AB0001".into(),
                    vehicle_type: "car".into(),
                },
            )
            .await
            .unwrap();
        let spot = lots.get_spot(lot.id, 2).await.unwrap();
        ReservationManager::new(pool.clone(), clock)
            .reserve(&alice, car.id, spot.id)
            .await
            .unwrap();

        let err = lots.delete_spot(lot.id, 2).await.unwrap_err();
        assert!(matches!(err, ParkingError::SpotReserved));

        let resize = LotUpdate {
            spot_count: Some(3),
            ..LotUpdate::default()
        };
        lots.update_lot(lot.id, resize).await.unwrap();
        let summary = lots.lot_summary(lot.id).await.unwrap();
        assert_eq!(summary.counts.total, 3);
        assert_eq!(summary.counts.reserved, 0);
        let holds: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reservations")
            .fetch_one(&*pool)
            .await
            .unwrap();
        assert_eq!(holds, 0);

        lots.delete_lot(lot.id).await.unwrap();
        let err = lots.get_lot(lot.id).await.unwrap_err();
        assert!(matches!(err, ParkingError::LotNotFound(_)));
    }

    #[tokio::test]
    async fn expired_hold_does_not_block_spot_delete() {
        let pool = test_pool().await;
        let (manual, clock) = fixture_clock();
        let lots = LotProvisioner::new(pool.clone()).with_clock(clock.clone());
        let lot = lots.create_lot(new_lot("1 MG Road", 2)).await.unwrap();
        let alice = driver();
        let car = VehicleRegistry::new(pool.clone())
            .register(
                &alice,
                VehicleInput {
                    license_plate: "KA01AB0001".into(),
                    vehicle_type: "car".into(),
                },
            )
            .await
            .unwrap();
        let spot = lots.get_spot(lot.id, 1).await.unwrap();
        ReservationManager::new(pool.clone(), clock)
            .reserve(&alice, car.id, spot.id)
            .await
            .unwrap();

        manual.advance_minutes(31);
        lots.delete_spot(lot.id, 1).await.unwrap();
        let summary = lots.lot_summary(lot.id).await.unwrap();
        assert_eq!(summary.counts.total, 1);
        assert_eq!(summary.counts.reserved, 0);
    }

    #[tokio::test]
    async fn update_spot_keeps_flag_and_status_together() {
        let lots = LotProvisioner::new(test_pool().await);
        let lot = lots.create_lot(new_lot("1 MG Road", 1)).await.unwrap();

        let spot = lots
            .update_spot(
                lot.id,
                1,
                SpotUpdate {
                    spot_type: Some("ev".into()),
                    is_occupied: Some(true),
                },
            )
            .await
            .unwrap();
        assert_eq!(spot.spot_type, "ev");
        assert!(spot.is_occupied);
        assert_eq!(spot.status, SpotStatus::Occupied);

        let err = lots
            .update_spot(lot.id, 7, SpotUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ParkingError::SpotNotFound));
    }

    #[tokio::test]
    async fn clearing_the_flag_leaves_a_reserved_spot_held() {
        let pool = test_pool().await;
        let (_, clock) = fixture_clock();
        let lots = LotProvisioner::new(pool.clone()).with_clock(clock.clone());
        let lot = lots.create_lot(new_lot("1 MG Road", 1)).await.unwrap();
        let vehicles = VehicleRegistry::new(pool.clone());
        let (alice, bob) = (driver(), driver());
        let alice_car = vehicles
            .register(
                &alice,
                VehicleInput {
                    license_plate: "KA01AB0001".into(),
                    vehicle_type: "car".into(),
                },
            )
            .await
            .unwrap();
        let bob_car = vehicles
            .register(
                &bob,
                VehicleInput {
                    license_plate: "KA01AB0002".into(),
                    vehicle_type: "car".into(),
                },
            )
            .await
            .unwrap();
        let reservations = ReservationManager::new(pool.clone(), clock);
        let spot = lots.get_spot(lot.id, 1).await.unwrap();
        reservations.reserve(&alice, alice_car.id, spot.id).await.unwrap();

        let spot = lots
            .update_spot(
                lot.id,
                1,
                SpotUpdate {
                    is_occupied: Some(false),
                    ..SpotUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(spot.status, SpotStatus::Reserved);
        assert!(!spot.is_occupied);

        let err = reservations
            .reserve(&bob, bob_car.id, spot.id)
            .await
            .unwrap_err();
        assert!(matches!(err, ParkingError::SpotUnavailable));

        let spot = lots
            .update_spot(
                lot.id,
                1,
                SpotUpdate {
                    is_occupied: Some(true),
                    ..SpotUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(spot.status, SpotStatus::Occupied);
        let spot = lots
            .update_spot(
                lot.id,
                1,
                SpotUpdate {
                    is_occupied: Some(false),
                    ..SpotUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(spot.status, SpotStatus::Available);
    }

    #[tokio::test]
    async fn reads_report_an_unswept_expired_hold_as_available() {
        let pool = test_pool().await;
        let (manual, clock) = fixture_clock();
        let lots = LotProvisioner::new(pool.clone()).with_clock(clock.clone());
        let lot = lots.create_lot(new_lot("1 MG Road", 2)).await.unwrap();
        let alice = driver();
        let car = VehicleRegistry::new(pool.clone())
            .register(
                &alice,
                VehicleInput {
                    license_plate: "KA01AB0001".into(),
                    vehicle_type: "car".into(),
                },
            )
            .await
            .unwrap();
        let spot = lots.get_spot(lot.id, 1).await.unwrap();
        ReservationManager::new(pool.clone(), clock)
            .reserve(&alice, car.id, spot.id)
            .await
            .unwrap();
        assert_eq!(lots.list_lots().await.unwrap()[0].counts.reserved, 1);
        assert_eq!(lots.get_spot(lot.id, 1).await.unwrap().status, SpotStatus::Reserved);

        manual.advance_minutes(31);
        let overview = &lots.list_lots().await.unwrap()[0];
        assert_eq!(overview.counts.reserved, 0);
        assert_eq!(overview.counts.available, 2);
        let summary = lots.lot_summary(lot.id).await.unwrap();
        assert_eq!(summary.counts.reserved, 0);
        assert_eq!(summary.spots[0].status, SpotStatus::Available);
        assert_eq!(lots.get_spot(lot.id, 1).await.unwrap().status, SpotStatus::Available);

        // reads leave the hold for the sweep
        let holds: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reservations")
            .fetch_one(&*pool)
            .await
            .unwrap();
        assert_eq!(holds, 1);
    }

    #[tokio::test]
    async fn moving_to_a_taken_address_is_a_conflict() {
        let lots = LotProvisioner::new(test_pool().await);
        lots.create_lot(new_lot("1 MG Road", 1)).await.unwrap();
        let other = lots.create_lot(new_lot("2 MG Road", 1)).await.unwrap();

        let err = lots
            .update_lot(
                other.id,
                LotUpdate {
                    address: Some("1 MG Road".into()),
                    ..LotUpdate::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ParkingError::DuplicateAddress(_)));
    }
}
