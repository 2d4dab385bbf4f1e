//! Booking domain module.
//!
//! A booking reserves a provider's time for a user. Creation emits a
//! [`BookingCreated`] event on the bus and arms a start-time reminder.

mod booking;
mod errors;
mod events;
mod query;

pub use booking::{
    validate_time_range, Booking, BookingStatus, BookingView, NewBooking, ServiceType,
};
pub use errors::BookingError;
pub use events::{BookingCreated, PayloadError, BOOKING_CREATED_CHANNEL};
pub use query::{BookingFilter, BookingPage, PageMeta, TimeWindow};
