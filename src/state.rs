//! Shared state handed to every handler.

use sqlx::SqlitePool;
use std::sync::Arc;

use crate::services::{
    booking_service::BookingManager, clock::SharedClock, lot_service::LotProvisioner,
    reservation_service::ReservationManager, vehicle_service::VehicleRegistry,
};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<SqlitePool>,
    pub lots: LotProvisioner,
    pub vehicles: VehicleRegistry,
    pub bookings: BookingManager,
    pub reservations: ReservationManager,
}

impl AppState {
    pub fn new(db: Arc<SqlitePool>, clock: SharedClock) -> Self {
        Self {
            lots: LotProvisioner::new(db.clone()).with_clock(clock.clone()),
            vehicles: VehicleRegistry::new(db.clone()).with_clock(clock.clone()),
            bookings: BookingManager::new(db.clone(), clock.clone()),
            reservations: ReservationManager::new(db.clone(), clock),
            db,
        }
    }
}
