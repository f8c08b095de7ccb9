//! HTTP handlers for the caller's own vehicles.

use crate::{
    errors::AppError,
    models::{
        caller::Caller,
        vehicle::{Vehicle, VehicleInput},
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

/// GET `/vehicles`
pub async fn list_vehicles(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<Vec<Vehicle>>, AppError> {
    Ok(Json(state.vehicles.list(&caller).await?))
}

/// POST `/vehicles`
pub async fn register_vehicle(
    State(state): State<AppState>,
    caller: Caller,
    Json(payload): Json<VehicleInput>,
) -> Result<impl IntoResponse, AppError> {
    let vehicle = state.vehicles.register(&caller, payload).await?;
    Ok((StatusCode::CREATED, Json(vehicle)))
}

/// PUT `/vehicles/{vehicle_id}`
pub async fn update_vehicle(
    State(state): State<AppState>,
    caller: Caller,
    Path(vehicle_id): Path<Uuid>,
    Json(payload): Json<VehicleInput>,
) -> Result<Json<Vehicle>, AppError> {
    Ok(Json(
        state.vehicles.update(&caller, vehicle_id, payload).await?,
    ))
}

/// DELETE `/vehicles/{vehicle_id}`
pub async fn delete_vehicle(
    State(state): State<AppState>,
    caller: Caller,
    Path(vehicle_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.vehicles.delete(&caller, vehicle_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
