//! Defines routes for the parking API.
//!
//! ## Structure
//! - **Driver endpoints** (any authenticated caller)
//!   - `GET    /lots`: lots with availability counters
//!   - `GET    /lots/{lot_id}/summary`: counters plus per-spot detail
//!   - `GET|POST /vehicles`, `PUT|DELETE /vehicles/{vehicle_id}`
//!   - `GET|POST /bookings`, `DELETE /bookings/{booking_id}`,
//!     `PATCH /bookings/{booking_id}/release`
//!   - `GET|POST /reservations`, `DELETE /reservations/{vehicle_id}`
//!
//! - **Admin endpoints** (role `admin`)
//!   - `GET|POST /admin/lots`, `GET|PUT|DELETE /admin/lots/{lot_id}`
//!   - `GET|PUT|DELETE /admin/lots/{lot_id}/spots/{spot_number}`
//!   - `GET    /admin/lots/{lot_id}/spots/{spot_number}/active-booking`
//!   - `GET    /admin/bookings`

use crate::{
    handlers::{
        booking_handlers::{book_spot, cancel_booking, list_bookings, release_booking},
        health_handlers::{healthz, readyz},
        lot_handlers::{
            active_booking, admin_list_lots, create_lot, delete_lot, delete_spot, get_lot,
            get_spot, list_all_bookings, list_lots, lot_summary, update_lot, update_spot,
        },
        reservation_handlers::{cancel_reservation, list_reservations, reserve_spot},
        vehicle_handlers::{delete_vehicle, list_vehicles, register_vehicle, update_vehicle},
    },
    state::AppState,
};
use axum::{
    Router,
    routing::{delete, get, patch, put},
};

/// Build and return the router for the whole API.
///
/// The router carries shared state (`AppState`) to all handlers.
pub fn routes() -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // Driver routes
        .route("/lots", get(list_lots))
        .route("/lots/{lot_id}/summary", get(lot_summary))
        .route("/vehicles", get(list_vehicles).post(register_vehicle))
        .route(
            "/vehicles/{vehicle_id}",
            put(update_vehicle).delete(delete_vehicle),
        )
        .route("/bookings", get(list_bookings).post(book_spot))
        .route("/bookings/{booking_id}", delete(cancel_booking))
        .route("/bookings/{booking_id}/release", patch(release_booking))
        .route("/reservations", get(list_reservations).post(reserve_spot))
        .route("/reservations/{vehicle_id}", delete(cancel_reservation))
        // Admin routes
        .route("/admin/lots", get(admin_list_lots).post(create_lot))
        .route(
            "/admin/lots/{lot_id}",
            get(get_lot).put(update_lot).delete(delete_lot),
        )
        .route(
            "/admin/lots/{lot_id}/spots/{spot_number}",
            get(get_spot).put(update_spot).delete(delete_spot),
        )
        .route(
            "/admin/lots/{lot_id}/spots/{spot_number}/active-booking",
            get(active_booking),
        )
        .route("/admin/bookings", get(list_all_bookings))
}
