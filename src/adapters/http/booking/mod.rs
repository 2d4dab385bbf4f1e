//! HTTP adapter for booking endpoints.

mod dto;
mod handlers;
mod routes;

pub use dto::{CreateBookingRequest, ErrorResponse, ListBookingsParams};
pub use handlers::BookingHandlers;
pub use routes::booking_routes;
