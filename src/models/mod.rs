//! Core data models for the parking reservation service.
//!
//! These entities mirror the relational tables (lots, spots, vehicles,
//! bookings, reservations). They map to rows via `sqlx::FromRow` and
//! serialize as JSON via `serde`. Relationships are id-based: a booking
//! keeps a nullable `spot_id`, never a pointer to the spot itself.

pub mod booking;
pub mod caller;
pub mod lot;
pub mod reservation;
pub mod spot;
pub mod vehicle;
