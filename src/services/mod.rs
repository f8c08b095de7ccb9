pub mod booking_service;
pub mod clock;
pub mod error;
pub mod expiry;
pub mod lot_service;
pub mod reservation_service;
pub mod spot_store;
pub mod vehicle_service;
