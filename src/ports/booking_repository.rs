//! BookingRepository port - Persistence for bookings.

use async_trait::async_trait;

use crate::domain::booking::{Booking, BookingFilter, NewBooking};
use crate::domain::foundation::{BookingId, DomainError};

/// Repository port for booking persistence.
///
/// Storage is the source of truth for bookings; the rest of the system only
/// holds copies returned from these methods.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Persists a new booking and returns it with its assigned id and
    /// timestamps.
    ///
    /// # Errors
    ///
    /// - `DatabaseError` on persistence failure
    async fn create(&self, booking: NewBooking) -> Result<Booking, DomainError>;

    /// Finds a booking by id.
    async fn find_by_id(&self, id: BookingId) -> Result<Option<Booking>, DomainError>;

    /// Lists bookings matching `filter`, ordered by start time ascending.
    ///
    /// `page` is one-based. Returns the requested page and the total number
    /// of matching rows.
    async fn list(
        &self,
        filter: &BookingFilter,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<Booking>, u64), DomainError>;
}
