//! HTTP handlers for 30-minute holds.

use crate::{
    errors::AppError,
    handlers::booking_handlers::VehicleFilter,
    models::{caller::Caller, reservation::ReservationView},
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

/// Body of `POST /reservations`.
#[derive(Debug, Deserialize)]
pub struct ReserveRequest {
    pub vehicle_id: Uuid,
    pub spot_id: Uuid,
}

/// POST `/reservations`: returns the hold id and its expiry.
pub async fn reserve_spot(
    State(state): State<AppState>,
    caller: Caller,
    Json(payload): Json<ReserveRequest>,
) -> Result<impl IntoResponse, AppError> {
    let receipt = state
        .reservations
        .reserve(&caller, payload.vehicle_id, payload.spot_id)
        .await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// GET `/reservations?vehicle_id=`
pub async fn list_reservations(
    State(state): State<AppState>,
    caller: Caller,
    Query(filter): Query<VehicleFilter>,
) -> Result<Json<Vec<ReservationView>>, AppError> {
    Ok(Json(
        state
            .reservations
            .list_active(&caller, filter.vehicle_id)
            .await?,
    ))
}

/// DELETE `/reservations/{vehicle_id}`: drop the vehicle's live hold.
pub async fn cancel_reservation(
    State(state): State<AppState>,
    caller: Caller,
    Path(vehicle_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.reservations.cancel(&caller, vehicle_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
