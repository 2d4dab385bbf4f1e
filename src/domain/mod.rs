//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, auth, errors)
//! - `booking` - Booking entity, events, and query types
//! - `audience` - Notification audience groups

pub mod audience;
pub mod booking;
pub mod foundation;
