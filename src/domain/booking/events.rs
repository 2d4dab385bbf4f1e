//! Booking events carried on the message bus.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::booking::Booking;

/// Channel on which booking creations are announced.
pub const BOOKING_CREATED_CHANNEL: &str = "booking.created";

/// Event published after a booking has been durably created.
///
/// Wire form: `{"schemaVersion":1,"booking":{...}}`. Both levels reject
/// unknown fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BookingCreated {
    pub schema_version: u32,
    pub booking: Booking,
}

/// Errors decoding a bus payload.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("Malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Unsupported schema version {0}")]
    UnsupportedVersion(u32),
}

impl BookingCreated {
    pub const SCHEMA_VERSION: u32 = 1;

    pub fn new(booking: Booking) -> Self {
        Self {
            schema_version: Self::SCHEMA_VERSION,
            booking,
        }
    }

    pub fn to_payload(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_payload(payload: &str) -> Result<Self, PayloadError> {
        let event: BookingCreated = serde_json::from_str(payload)?;
        if event.schema_version != Self::SCHEMA_VERSION {
            return Err(PayloadError::UnsupportedVersion(event.schema_version));
        }
        Ok(event)
    }
}
