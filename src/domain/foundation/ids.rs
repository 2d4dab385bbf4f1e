//! Strongly-typed identifier value objects.
//!
//! Bookings and users are keyed by positive integers assigned by the
//! storage collaborator (a `BIGSERIAL` in Postgres).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use super::ValidationError;

/// Identifier of a persisted booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookingId(i64);

impl BookingId {
    /// Creates a BookingId, rejecting zero and negative values.
    pub fn new(id: i64) -> Result<Self, ValidationError> {
        if id <= 0 {
            return Err(ValidationError::out_of_range("booking_id", 1, i32::MAX, clamp(id)));
        }
        Ok(Self(id))
    }

    /// Wraps a raw value without validation (storage rows, test fixtures).
    pub fn from_raw(id: i64) -> Self {
        Self(id)
    }

    /// Returns the inner value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for BookingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BookingId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

/// Identifier of a user account. Providers are users too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(i64);

impl UserId {
    /// Creates a UserId, rejecting zero and negative values.
    pub fn new(id: i64) -> Result<Self, ValidationError> {
        if id <= 0 {
            return Err(ValidationError::out_of_range("user_id", 1, i32::MAX, clamp(id)));
        }
        Ok(Self(id))
    }

    /// Wraps a raw value without validation.
    pub fn from_raw(id: i64) -> Self {
        Self(id)
    }

    /// Returns the inner value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

fn clamp(value: i64) -> i32 {
    value.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}
