//! HTTP adapters - REST API implementations.

pub mod booking;
pub mod middleware;

use std::sync::Arc;

use axum::Router;

use crate::ports::TokenVerifier;

pub use booking::{booking_routes, BookingHandlers};
pub use middleware::{auth_middleware, RequireAuth};

/// Booking REST API with bearer authentication applied.
pub fn api_router(handlers: BookingHandlers, verifier: Arc<dyn TokenVerifier>) -> Router {
    booking_routes(handlers).layer(axum::middleware::from_fn_with_state(
        verifier,
        auth_middleware,
    ))
}
