//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `auth` - Access token verification (JWT, mock)
//! - `events` - Event bus implementations (in-memory, Redis)
//! - `http` - REST API for bookings
//! - `postgres` - PostgreSQL booking storage
//! - `scheduler` - Tokio-timer reminder scheduler
//! - `storage` - In-memory booking storage
//! - `websocket` - Real-time notification gateway

pub mod auth;
pub mod events;
pub mod http;
pub mod postgres;
pub mod scheduler;
pub mod storage;
pub mod websocket;

pub use auth::{JwtTokenVerifier, MockTokenVerifier};
pub use events::{InMemoryEventBus, RedisEventBus};
pub use postgres::PostgresBookingRepository;
pub use scheduler::TokioReminderScheduler;
pub use storage::InMemoryBookingRepository;
pub use websocket::{AudienceRegistry, GatewayState};
