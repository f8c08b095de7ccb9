//! HTTP handlers for bookings.

use crate::{
    errors::AppError,
    models::{booking::BookingView, caller::Caller},
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Body of `POST /bookings`.
#[derive(Debug, Deserialize)]
pub struct BookRequest {
    pub vehicle_id: Uuid,
    pub spot_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct BookResponse {
    pub booking_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct ReleaseResponse {
    pub end_time: DateTime<FixedOffset>,
}

/// Optional `?vehicle_id=` filter for listings.
#[derive(Debug, Deserialize)]
pub struct VehicleFilter {
    pub vehicle_id: Option<Uuid>,
}

/// POST `/bookings`: occupy a spot, consuming the vehicle's hold if any.
pub async fn book_spot(
    State(state): State<AppState>,
    caller: Caller,
    Json(payload): Json<BookRequest>,
) -> Result<impl IntoResponse, AppError> {
    let booking_id = state
        .bookings
        .book(&caller, payload.vehicle_id, payload.spot_id)
        .await?;
    Ok((StatusCode::CREATED, Json(BookResponse { booking_id })))
}

/// GET `/bookings?vehicle_id=`
pub async fn list_bookings(
    State(state): State<AppState>,
    caller: Caller,
    Query(filter): Query<VehicleFilter>,
) -> Result<Json<Vec<BookingView>>, AppError> {
    Ok(Json(
        state
            .bookings
            .list_for_vehicle(&caller, filter.vehicle_id)
            .await?,
    ))
}

/// PATCH `/bookings/{booking_id}/release`
pub async fn release_booking(
    State(state): State<AppState>,
    caller: Caller,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<ReleaseResponse>, AppError> {
    let end_time = state.bookings.release(&caller, booking_id).await?;
    Ok(Json(ReleaseResponse { end_time }))
}

/// DELETE `/bookings/{booking_id}`: undo a booking.
pub async fn cancel_booking(
    State(state): State<AppState>,
    caller: Caller,
    Path(booking_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.bookings.cancel(&caller, booking_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
