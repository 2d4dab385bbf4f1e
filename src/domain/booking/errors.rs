//! Booking-specific error types.

use thiserror::Error;

use crate::domain::foundation::{BookingId, DomainError, ErrorCode};

/// Errors surfaced by booking commands and queries.
///
/// Only client-input problems and storage outages reach callers; broker
/// and scheduler failures never appear here.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BookingError {
    /// The requested window is in the past or empty.
    #[error("{reason}")]
    InvalidTimeRange { reason: &'static str },

    /// A booking id that can never exist (zero or negative).
    #[error("Invalid booking id: {0}")]
    InvalidId(i64),

    /// Page or limit below one.
    #[error("Page and limit must be positive numbers")]
    InvalidPagination,

    #[error("Booking with id {0} not found")]
    NotFound(BookingId),

    #[error("Not authorized to access this booking")]
    Forbidden,

    /// Storage failed. The detail is for logs, not for API responses.
    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),
}

impl BookingError {
    pub fn code(&self) -> ErrorCode {
        match self {
            BookingError::InvalidTimeRange { .. } => ErrorCode::InvalidTimeRange,
            BookingError::InvalidId(_) => ErrorCode::ValidationFailed,
            BookingError::InvalidPagination => ErrorCode::InvalidPagination,
            BookingError::NotFound(_) => ErrorCode::BookingNotFound,
            BookingError::Forbidden => ErrorCode::Forbidden,
            BookingError::PersistenceFailure(_) => ErrorCode::DatabaseError,
        }
    }

    /// Message safe to show to API clients.
    pub fn public_message(&self) -> String {
        match self {
            BookingError::PersistenceFailure(_) => "Failed to process booking".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<DomainError> for BookingError {
    fn from(err: DomainError) -> Self {
        BookingError::PersistenceFailure(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persistence_failure_hides_detail_from_clients() {
        let err = BookingError::from(DomainError::database("connection refused on 10.0.0.3"));

        assert_eq!(err.code(), ErrorCode::DatabaseError);
        assert!(!err.public_message().contains("10.0.0.3"));
        assert!(err.to_string().contains("10.0.0.3"));
    }

    #[test]
    fn invalid_time_range_shows_reason() {
        let err = BookingError::InvalidTimeRange {
            reason: "End time must be after start time",
        };
        assert_eq!(err.public_message(), "End time must be after start time");
        assert_eq!(err.code(), ErrorCode::InvalidTimeRange);
    }
}
