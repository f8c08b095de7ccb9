pub mod booking_handlers;
pub mod health_handlers;
pub mod identity;
pub mod lot_handlers;
pub mod reservation_handlers;
pub mod vehicle_handlers;
