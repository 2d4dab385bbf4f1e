//! Booking entity, its creation input, and the outward projection.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{BookingId, Timestamp, UserId, ValidationError};

use super::errors::BookingError;

/// Kind of appointment being booked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceType {
    Consultation,
    Checkup,
    Therapy,
    FollowUp,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::Consultation => "CONSULTATION",
            ServiceType::Checkup => "CHECKUP",
            ServiceType::Therapy => "THERAPY",
            ServiceType::FollowUp => "FOLLOW_UP",
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CONSULTATION" => Ok(ServiceType::Consultation),
            "CHECKUP" => Ok(ServiceType::Checkup),
            "THERAPY" => Ok(ServiceType::Therapy),
            "FOLLOW_UP" => Ok(ServiceType::FollowUp),
            other => Err(ValidationError::invalid_format(
                "service_type",
                format!("unknown service type '{}'", other),
            )),
        }
    }
}

/// Lifecycle status of a booking. New bookings are always `Confirmed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Completed => "COMPLETED",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CONFIRMED" => Ok(BookingStatus::Confirmed),
            "CANCELLED" => Ok(BookingStatus::Cancelled),
            "COMPLETED" => Ok(BookingStatus::Completed),
            other => Err(ValidationError::invalid_format(
                "status",
                format!("unknown booking status '{}'", other),
            )),
        }
    }
}

/// A persisted booking as returned by the storage collaborator.
///
/// The pipeline only ever holds transient copies of this value; the row in
/// storage is the source of truth. Unknown fields are rejected so that the
/// bus payload schema stays closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Booking {
    pub id: BookingId,
    pub user_id: UserId,
    pub provider_id: UserId,
    pub service_type: ServiceType,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub status: BookingStatus,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Booking {
    /// Materializes a booking from creation input once storage assigned an id.
    pub fn from_new(id: BookingId, new: NewBooking, created_at: Timestamp) -> Self {
        Self {
            id,
            user_id: new.user_id,
            provider_id: new.provider_id,
            service_type: new.service_type,
            start_time: new.start_time,
            end_time: new.end_time,
            status: new.status,
            created_at,
            updated_at: created_at,
        }
    }

    /// Public projection returned to API callers.
    pub fn view(&self) -> BookingView {
        BookingView::from(self)
    }
}

/// Fields handed to storage when creating a booking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBooking {
    pub user_id: UserId,
    pub provider_id: UserId,
    pub service_type: ServiceType,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub status: BookingStatus,
}

/// Outward projection of a booking. The provider is not exposed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingView {
    pub id: BookingId,
    pub user_id: UserId,
    pub service_type: ServiceType,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub status: BookingStatus,
}

impl From<&Booking> for BookingView {
    fn from(booking: &Booking) -> Self {
        Self {
            id: booking.id,
            user_id: booking.user_id,
            service_type: booking.service_type,
            start_time: booking.start_time,
            end_time: booking.end_time,
            status: booking.status,
        }
    }
}

/// Checks the creation-time invariants of a booking window.
///
/// `start` must be strictly after `now` and `end` strictly after `start`.
pub fn validate_time_range(
    start: Timestamp,
    end: Timestamp,
    now: Timestamp,
) -> Result<(), BookingError> {
    if !start.is_after(&now) {
        return Err(BookingError::InvalidTimeRange {
            reason: "Cannot create a booking in the past",
        });
    }
    if !end.is_after(&start) {
        return Err(BookingError::InvalidTimeRange {
            reason: "End time must be after start time",
        });
    }
    Ok(())
}
