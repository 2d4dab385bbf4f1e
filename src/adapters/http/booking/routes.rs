//! HTTP routes for booking endpoints.

use axum::{routing::get, Router};

use super::handlers::{create_booking, get_booking, list_bookings, BookingHandlers};

/// Creates the booking router. Expects the auth middleware to be layered
/// on top so `RequireAuth` can find the caller.
pub fn booking_routes(handlers: BookingHandlers) -> Router {
    Router::new()
        .route("/api/bookings", get(list_bookings).post(create_booking))
        .route("/api/bookings/:id", get(get_booking))
        .with_state(handlers)
}
