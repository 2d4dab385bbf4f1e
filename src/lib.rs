//! Bookwire - Booking backend with real-time notifications
//!
//! Bookings are created over HTTP, persisted in PostgreSQL and announced on
//! a Redis pub/sub channel. A notification fan-out relays each announcement,
//! and each start-time reminder, to connected WebSocket clients grouped by
//! audience (administrators, and the booking's provider).

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
