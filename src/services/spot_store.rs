//! Spot state cell.
//!
//! Holds each spot's allocation status and derived occupancy flag. No
//! business rules live here: the booking, reservation and provisioning
//! services decide *whether* a transition is allowed, this module only
//! reads and writes it. Every function runs on the caller's connection so
//! a unit of work always observes its own writes.

use sqlx::SqliteConnection;
use tracing::debug;
use uuid::Uuid;

use crate::models::spot::{ParkingSpot, SpotStatus};
use crate::services::error::{ParkingError, ParkingResult};

const SPOT_COLUMNS: &str = "id, lot_id, spot_number, spot_type, is_occupied, status";

pub async fn find_spot(conn: &mut SqliteConnection, spot_id: Uuid) -> ParkingResult<Option<ParkingSpot>> {
    let spot = sqlx::query_as::<_, ParkingSpot>(&format!(
        "SELECT {SPOT_COLUMNS} FROM parking_spots WHERE id = ?"
    ))
    .bind(spot_id)
    .fetch_optional(conn)
    .await?;
    Ok(spot)
}

/// Fetch a spot by id. Returns SpotNotFound if missing.
pub async fn fetch_spot(conn: &mut SqliteConnection, spot_id: Uuid) -> ParkingResult<ParkingSpot> {
    find_spot(conn, spot_id)
        .await?
        .ok_or(ParkingError::SpotNotFound)
}

/// Fetch a spot by its number within a lot.
pub async fn fetch_spot_by_number(
    conn: &mut SqliteConnection,
    lot_id: Uuid,
    spot_number: i64,
) -> ParkingResult<ParkingSpot> {
    sqlx::query_as::<_, ParkingSpot>(&format!(
        "SELECT {SPOT_COLUMNS} FROM parking_spots WHERE lot_id = ? AND spot_number = ?"
    ))
    .bind(lot_id)
    .bind(spot_number)
    .fetch_optional(conn)
    .await?
    .ok_or(ParkingError::SpotNotFound)
}

pub async fn spots_in_lot(conn: &mut SqliteConnection, lot_id: Uuid) -> ParkingResult<Vec<ParkingSpot>> {
    let spots = sqlx::query_as::<_, ParkingSpot>(&format!(
        "SELECT {SPOT_COLUMNS} FROM parking_spots WHERE lot_id = ? ORDER BY spot_number ASC"
    ))
    .bind(lot_id)
    .fetch_all(conn)
    .await?;
    Ok(spots)
}

pub async fn get_status(conn: &mut SqliteConnection, spot_id: Uuid) -> ParkingResult<SpotStatus> {
    Ok(fetch_spot(conn, spot_id).await?.status)
}

/// Unconditionally set status and occupancy flag in one write.
pub async fn set_status(
    conn: &mut SqliteConnection,
    spot_id: Uuid,
    status: SpotStatus,
) -> ParkingResult<()> {
    let result = sqlx::query("UPDATE parking_spots SET status = ?, is_occupied = ? WHERE id = ?")
        .bind(status)
        .bind(status.occupied_flag())
        .bind(spot_id)
        .execute(conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ParkingError::SpotNotFound);
    }
    Ok(())
}

/// Compare-and-set: move the spot from `from` to `to`.
///
/// Returns false when the spot is missing or no longer in `from`.
pub async fn transition(
    conn: &mut SqliteConnection,
    spot_id: Uuid,
    from: SpotStatus,
    to: SpotStatus,
) -> ParkingResult<bool> {
    let result = sqlx::query(
        "UPDATE parking_spots SET status = ?, is_occupied = ? WHERE id = ? AND status = ?",
    )
    .bind(to)
    .bind(to.occupied_flag())
    .bind(spot_id)
    .bind(from)
    .execute(conn)
    .await?;
    let moved = result.rows_affected() == 1;
    debug!(%spot_id, from = from.as_str(), to = to.as_str(), moved, "spot transition");
    Ok(moved)
}

pub async fn count_by_lot_and_status(
    conn: &mut SqliteConnection,
    lot_id: Uuid,
    status: SpotStatus,
) -> ParkingResult<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM parking_spots WHERE lot_id = ? AND status = ?",
    )
    .bind(lot_id)
    .bind(status)
    .fetch_one(conn)
    .await?;
    Ok(count)
}
