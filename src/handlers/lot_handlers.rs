//! HTTP handlers for lots and spots. Everything under `/admin` runs behind
//! `Caller::require_admin`.

use crate::{
    errors::AppError,
    models::{
        booking::{ActiveBookingView, BookingView},
        caller::Caller,
        lot::{LotOverview, LotSummary, LotUpdate, NewLot, ParkingLot},
        spot::{ParkingSpot, SpotUpdate},
    },
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

/// GET `/lots`: every lot with its availability counters.
pub async fn list_lots(
    State(state): State<AppState>,
    _caller: Caller,
) -> Result<Json<Vec<LotOverview>>, AppError> {
    Ok(Json(state.lots.list_lots().await?))
}

/// GET `/lots/{lot_id}/summary`
pub async fn lot_summary(
    State(state): State<AppState>,
    _caller: Caller,
    Path(lot_id): Path<Uuid>,
) -> Result<Json<LotSummary>, AppError> {
    Ok(Json(state.lots.lot_summary(lot_id).await?))
}

/// GET `/admin/lots`
pub async fn admin_list_lots(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<Vec<LotOverview>>, AppError> {
    caller.require_admin()?;
    Ok(Json(state.lots.list_lots().await?))
}

/// POST `/admin/lots`: create a lot and its spots.
pub async fn create_lot(
    State(state): State<AppState>,
    caller: Caller,
    Json(payload): Json<NewLot>,
) -> Result<impl IntoResponse, AppError> {
    caller.require_admin()?;
    let lot = state.lots.create_lot(payload).await?;
    Ok((StatusCode::CREATED, Json(lot)))
}

/// GET `/admin/lots/{lot_id}`
pub async fn get_lot(
    State(state): State<AppState>,
    caller: Caller,
    Path(lot_id): Path<Uuid>,
) -> Result<Json<ParkingLot>, AppError> {
    caller.require_admin()?;
    Ok(Json(state.lots.get_lot(lot_id).await?))
}

/// PUT `/admin/lots/{lot_id}`: partial update; a new spot count rebuilds
/// the lot's spots.
pub async fn update_lot(
    State(state): State<AppState>,
    caller: Caller,
    Path(lot_id): Path<Uuid>,
    Json(payload): Json<LotUpdate>,
) -> Result<Json<ParkingLot>, AppError> {
    caller.require_admin()?;
    Ok(Json(state.lots.update_lot(lot_id, payload).await?))
}

/// DELETE `/admin/lots/{lot_id}`
pub async fn delete_lot(
    State(state): State<AppState>,
    caller: Caller,
    Path(lot_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    caller.require_admin()?;
    state.lots.delete_lot(lot_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET `/admin/lots/{lot_id}/spots/{spot_number}`
pub async fn get_spot(
    State(state): State<AppState>,
    caller: Caller,
    Path((lot_id, spot_number)): Path<(Uuid, i64)>,
) -> Result<Json<ParkingSpot>, AppError> {
    caller.require_admin()?;
    Ok(Json(state.lots.get_spot(lot_id, spot_number).await?))
}

/// PUT `/admin/lots/{lot_id}/spots/{spot_number}`
pub async fn update_spot(
    State(state): State<AppState>,
    caller: Caller,
    Path((lot_id, spot_number)): Path<(Uuid, i64)>,
    Json(payload): Json<SpotUpdate>,
) -> Result<Json<ParkingSpot>, AppError> {
    caller.require_admin()?;
    Ok(Json(
        state.lots.update_spot(lot_id, spot_number, payload).await?,
    ))
}

/// DELETE `/admin/lots/{lot_id}/spots/{spot_number}`
pub async fn delete_spot(
    State(state): State<AppState>,
    caller: Caller,
    Path((lot_id, spot_number)): Path<(Uuid, i64)>,
) -> Result<StatusCode, AppError> {
    caller.require_admin()?;
    state.lots.delete_spot(lot_id, spot_number).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET `/admin/lots/{lot_id}/spots/{spot_number}/active-booking`
pub async fn active_booking(
    State(state): State<AppState>,
    caller: Caller,
    Path((lot_id, spot_number)): Path<(Uuid, i64)>,
) -> Result<Json<ActiveBookingView>, AppError> {
    caller.require_admin()?;
    Ok(Json(
        state
            .bookings
            .active_booking_for_spot(lot_id, spot_number)
            .await?,
    ))
}

/// GET `/admin/bookings`: full booking history.
pub async fn list_all_bookings(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<Vec<BookingView>>, AppError> {
    caller.require_admin()?;
    Ok(Json(state.bookings.list_all().await?))
}
