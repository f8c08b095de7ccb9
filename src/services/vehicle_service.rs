//! Vehicle registry and the ownership lookup used by the booking and
//! reservation paths.

use mockable::DefaultClock;
use sqlx::{SqliteConnection, SqlitePool};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::BEGIN_WRITE;
use crate::models::{
    caller::Caller,
    vehicle::{Vehicle, VehicleInput},
};
use crate::services::{
    clock::{SharedClock, business_now},
    error::{ParkingError, ParkingResult, is_unique_violation},
    reservation_service::{find_for_vehicle, reclaim},
};

pub(crate) async fn find_vehicle(
    conn: &mut SqliteConnection,
    vehicle_id: Uuid,
) -> ParkingResult<Option<Vehicle>> {
    let vehicle = sqlx::query_as::<_, Vehicle>(
        "SELECT id, license_plate, vehicle_type, user_id FROM vehicles WHERE id = ?",
    )
    .bind(vehicle_id)
    .fetch_optional(conn)
    .await?;
    Ok(vehicle)
}

/// "Does vehicle X belong to caller Y".
///
/// Absent → VehicleNotFound, owned by another user → Forbidden.
pub(crate) async fn owned_vehicle(
    conn: &mut SqliteConnection,
    caller: &Caller,
    vehicle_id: Uuid,
) -> ParkingResult<Vehicle> {
    let vehicle = find_vehicle(conn, vehicle_id)
        .await?
        .ok_or(ParkingError::VehicleNotFound(vehicle_id))?;
    if vehicle.user_id != caller.user_id {
        return Err(ParkingError::Forbidden(
            "vehicle is not owned by the caller".into(),
        ));
    }
    Ok(vehicle)
}

fn validate(input: &VehicleInput) -> ParkingResult<(String, String)> {
    let plate = input.license_plate.trim();
    let kind = input.vehicle_type.trim();
    if plate.is_empty() {
        return Err(ParkingError::InvalidInput("license plate is required".into()));
    }
    if kind.is_empty() {
        return Err(ParkingError::InvalidInput("vehicle type is required".into()));
    }
    Ok((plate.to_string(), kind.to_string()))
}

#[derive(Clone)]
pub struct VehicleRegistry {
    db: Arc<SqlitePool>,
    clock: SharedClock,
}

impl VehicleRegistry {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self {
            db,
            clock: Arc::new(DefaultClock),
        }
    }

    /// Clock used to tell a live hold from an expired one on delete.
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    pub async fn register(&self, caller: &Caller, input: VehicleInput) -> ParkingResult<Vehicle> {
        let (license_plate, vehicle_type) = validate(&input)?;
        let vehicle = Vehicle {
            id: Uuid::new_v4(),
            license_plate,
            vehicle_type,
            user_id: caller.user_id,
        };

        match sqlx::query(
            "INSERT INTO vehicles (id, license_plate, vehicle_type, user_id) VALUES (?, ?, ?, ?)",
        )
        .bind(vehicle.id)
        .bind(&vehicle.license_plate)
        .bind(&vehicle.vehicle_type)
        .bind(vehicle.user_id)
        .execute(&*self.db)
        .await
        {
            Ok(_) => {
                tracing::info!(vehicle_id = %vehicle.id, user_id = %caller.user_id, "vehicle registered");
                Ok(vehicle)
            }
            Err(err) if is_unique_violation(&err) => {
                Err(ParkingError::DuplicateLicensePlate(vehicle.license_plate))
            }
            Err(err) => Err(ParkingError::Sqlx(err)),
        }
    }

    pub async fn list(&self, caller: &Caller) -> ParkingResult<Vec<Vehicle>> {
        let vehicles = sqlx::query_as::<_, Vehicle>(
            "SELECT id, license_plate, vehicle_type, user_id FROM vehicles
             WHERE user_id = ? ORDER BY license_plate ASC",
        )
        .bind(caller.user_id)
        .fetch_all(&*self.db)
        .await?;
        Ok(vehicles)
    }

    /// Replace plate and type. Vehicles of other users look absent.
    pub async fn update(
        &self,
        caller: &Caller,
        vehicle_id: Uuid,
        input: VehicleInput,
    ) -> ParkingResult<Vehicle> {
        let (license_plate, vehicle_type) = validate(&input)?;
        let result = sqlx::query(
            "UPDATE vehicles SET license_plate = ?, vehicle_type = ? WHERE id = ? AND user_id = ?",
        )
        .bind(&license_plate)
        .bind(&vehicle_type)
        .bind(vehicle_id)
        .bind(caller.user_id)
        .execute(&*self.db)
        .await;

        match result {
            Ok(done) if done.rows_affected() == 0 => Err(ParkingError::VehicleNotFound(vehicle_id)),
            Ok(_) => Ok(Vehicle {
                id: vehicle_id,
                license_plate,
                vehicle_type,
                user_id: caller.user_id,
            }),
            Err(err) if is_unique_violation(&err) => {
                Err(ParkingError::DuplicateLicensePlate(license_plate))
            }
            Err(err) => Err(ParkingError::Sqlx(err)),
        }
    }

    /// Remove a vehicle with no active booking and no live hold. Its
    /// completed bookings go with it; an expired hold is reclaimed first so
    /// its spot is handed back.
    pub async fn delete(&self, caller: &Caller, vehicle_id: Uuid) -> ParkingResult<()> {
        let now = business_now(self.clock.as_ref());
        let mut tx = self.db.begin_with(BEGIN_WRITE).await?;
        let vehicle = find_vehicle(&mut tx, vehicle_id)
            .await?
            .filter(|v| v.user_id == caller.user_id)
            .ok_or(ParkingError::VehicleNotFound(vehicle_id))?;

        let active_booking: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM bookings WHERE vehicle_id = ? AND end_time IS NULL",
        )
        .bind(vehicle.id)
        .fetch_one(&mut *tx)
        .await?;
        if active_booking > 0 {
            return Err(ParkingError::VehicleBusy);
        }
        if let Some(hold) = find_for_vehicle(&mut tx, vehicle.id).await? {
            if hold.is_live(now) {
                return Err(ParkingError::VehicleBusy);
            }
            reclaim(&mut tx, &hold).await?;
        }

        sqlx::query("DELETE FROM vehicles WHERE id = ?")
            .bind(vehicle.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(vehicle_id = %vehicle.id, "vehicle deleted");
        Ok(())
    }
}
