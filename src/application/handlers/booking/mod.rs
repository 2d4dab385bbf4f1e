//! Booking command and query handlers.

mod create_booking;
mod get_booking;
mod list_bookings;

pub use create_booking::{CreateBookingCommand, CreateBookingHandler, DEFAULT_REMINDER_OFFSET_MINS};
pub use get_booking::GetBookingHandler;
pub use list_bookings::{ListBookingsHandler, ListBookingsQuery};
