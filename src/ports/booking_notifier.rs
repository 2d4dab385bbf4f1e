//! BookingNotifier port - Direct notification path used by reminders.

use async_trait::async_trait;

use crate::domain::booking::Booking;

/// Informs interested parties about a booking without going through the bus.
#[async_trait]
pub trait BookingNotifier: Send + Sync {
    /// Delivers or buffers a notification. Never fails.
    async fn notify(&self, booking: Booking);
}
