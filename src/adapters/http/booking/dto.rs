//! HTTP DTOs for booking endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::booking::{BookingError, ServiceType, TimeWindow};

/// Request to create a booking. The owner is the authenticated caller.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    pub provider_id: i64,
    pub service_type: ServiceType,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// Query parameters for listing bookings.
///
/// A missing `type` lists past bookings.
#[derive(Debug, Clone, Deserialize)]
pub struct ListBookingsParams {
    #[serde(rename = "type", default)]
    pub window: Option<TimeWindow>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    10
}

/// Standard error response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            code: "BAD_REQUEST".to_string(),
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self {
            code: "FORBIDDEN".to_string(),
            message: message.into(),
        }
    }
}

impl From<&BookingError> for ErrorResponse {
    fn from(error: &BookingError) -> Self {
        Self {
            code: error.code().to_string(),
            message: error.public_message(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_reads_camel_case() {
        let req: CreateBookingRequest = serde_json::from_str(
            r#"{"providerId":7,"serviceType":"FOLLOW_UP",
                "startTime":"2030-01-01T10:00:00Z","endTime":"2030-01-01T10:30:00.000Z"}"#,
        )
        .unwrap();

        assert_eq!(req.provider_id, 7);
        assert_eq!(req.service_type, ServiceType::FollowUp);
        assert!(req.end_time > req.start_time);
    }

    #[test]
    fn create_request_rejects_unknown_service_type() {
        let result: Result<CreateBookingRequest, _> = serde_json::from_str(
            r#"{"providerId":7,"serviceType":"MASSAGE",
                "startTime":"2030-01-01T10:00:00Z","endTime":"2030-01-01T10:30:00Z"}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn persistence_errors_are_opaque() {
        let body = ErrorResponse::from(&BookingError::PersistenceFailure("pool timed out".into()));
        assert_eq!(body.code, "DATABASE_ERROR");
        assert_eq!(body.message, "Failed to process booking");
    }
}
