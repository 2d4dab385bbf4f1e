//! Storage Adapters
//!
//! - **InMemoryBookingRepository** - Stores bookings in memory (testing/development)
//!
//! The production store is `adapters::postgres::PostgresBookingRepository`.

mod in_memory_booking_repository;

pub use in_memory_booking_repository::InMemoryBookingRepository;
