//! Foundation module - Shared domain primitives.
//!
//! Contains value objects, identifiers, auth types, and error types
//! that form the vocabulary of the booking domain.

mod auth;
mod errors;
mod ids;
mod timestamp;

pub use auth::{AuthError, Identity, Role};
pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::{BookingId, UserId};
pub use timestamp::Timestamp;
