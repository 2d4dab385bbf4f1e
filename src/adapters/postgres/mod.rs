//! PostgreSQL adapters - Database implementations for repository ports.
//!
//! - `PostgresBookingRepository` - Booking persistence

mod booking_repository;

pub use booking_repository::PostgresBookingRepository;
