//! AudienceBroadcaster port - Pushes booking events to audience groups.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::audience::AudienceGroup;
use crate::domain::booking::Booking;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("Failed to encode event: {0}")]
    Encode(String),

    #[error("Transport failure: {0}")]
    Transport(String),
}

/// Real-time transport as seen by the fan-out service.
#[async_trait]
pub trait AudienceBroadcaster: Send + Sync {
    /// Sends a `booking.created` event to every member of `group`.
    ///
    /// Returns the number of members the event was handed to. A group with
    /// no members is not an error.
    async fn deliver(&self, group: AudienceGroup, booking: &Booking)
        -> Result<usize, DeliveryError>;
}
