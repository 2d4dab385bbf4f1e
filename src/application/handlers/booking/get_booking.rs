//! GetBookingHandler - Query handler for a single booking.

use std::sync::Arc;

use crate::domain::booking::{Booking, BookingError, BookingView};
use crate::domain::foundation::{BookingId, Identity, Role};
use crate::ports::BookingRepository;

/// Handler for reading one booking with role-scoped access.
///
/// Admins see every booking. Otherwise each held role must match: a provider
/// must be the booking's provider and a user must be its owner.
pub struct GetBookingHandler {
    repository: Arc<dyn BookingRepository>,
}

impl GetBookingHandler {
    pub fn new(repository: Arc<dyn BookingRepository>) -> Self {
        Self { repository }
    }

    pub async fn handle(&self, id: i64, caller: &Identity) -> Result<BookingView, BookingError> {
        let booking_id = BookingId::new(id).map_err(|_| BookingError::InvalidId(id))?;

        let booking = self
            .repository
            .find_by_id(booking_id)
            .await
            .map_err(|e| {
                tracing::error!(booking_id = %booking_id, error = %e, "Failed to load booking");
                BookingError::from(e)
            })?
            .ok_or(BookingError::NotFound(booking_id))?;

        if !can_view(caller, &booking) {
            tracing::debug!(booking_id = %booking_id, user_id = %caller.subject, "Booking access denied");
            return Err(BookingError::Forbidden);
        }

        Ok(booking.view())
    }
}

fn can_view(caller: &Identity, booking: &Booking) -> bool {
    if caller.is_admin() {
        return true;
    }

    let as_provider = caller.has_role(Role::Provider);
    let as_user = caller.has_role(Role::User);

    // Every relationship the caller's roles imply must hold.
    (as_provider || as_user)
        && (!as_provider || booking.provider_id == caller.subject)
        && (!as_user || booking.user_id == caller.subject)
}
