//! In-Memory Booking Repository
//!
//! Stores bookings in memory. Useful for testing and development.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::booking::{Booking, BookingFilter, NewBooking};
use crate::domain::foundation::{BookingId, DomainError, Timestamp};
use crate::ports::BookingRepository;

/// In-memory storage for bookings. Ids start at 1.
#[derive(Debug, Clone)]
pub struct InMemoryBookingRepository {
    bookings: Arc<RwLock<BTreeMap<BookingId, Booking>>>,
    next_id: Arc<AtomicI64>,
    create_calls: Arc<AtomicUsize>,
    failure: Arc<RwLock<Option<String>>>,
}

impl InMemoryBookingRepository {
    pub fn new() -> Self {
        Self {
            bookings: Arc::new(RwLock::new(BTreeMap::new())),
            next_id: Arc::new(AtomicI64::new(1)),
            create_calls: Arc::new(AtomicUsize::new(0)),
            failure: Arc::new(RwLock::new(None)),
        }
    }

    /// Makes every subsequent call fail with a database error.
    pub async fn fail_with(&self, reason: impl Into<String>) {
        *self.failure.write().await = Some(reason.into());
    }

    pub async fn recover(&self) {
        *self.failure.write().await = None;
    }

    /// Inserts a fully formed booking, bypassing id assignment.
    pub async fn insert(&self, booking: Booking) {
        self.next_id
            .fetch_max(booking.id.as_i64() + 1, Ordering::SeqCst);
        self.bookings.write().await.insert(booking.id, booking);
    }

    /// Number of `create` calls, successful or not.
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub async fn len(&self) -> usize {
        self.bookings.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.bookings.read().await.is_empty()
    }

    async fn check_failure(&self) -> Result<(), DomainError> {
        match self.failure.read().await.as_ref() {
            Some(reason) => Err(DomainError::database(reason.clone())),
            None => Ok(()),
        }
    }
}

impl Default for InMemoryBookingRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BookingRepository for InMemoryBookingRepository {
    async fn create(&self, booking: NewBooking) -> Result<Booking, DomainError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure().await?;

        let id = BookingId::from_raw(self.next_id.fetch_add(1, Ordering::SeqCst));
        let created = Booking::from_new(id, booking, Timestamp::now());
        self.bookings.write().await.insert(id, created.clone());
        Ok(created)
    }

    async fn find_by_id(&self, id: BookingId) -> Result<Option<Booking>, DomainError> {
        self.check_failure().await?;
        Ok(self.bookings.read().await.get(&id).cloned())
    }

    async fn list(
        &self,
        filter: &BookingFilter,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<Booking>, u64), DomainError> {
        self.check_failure().await?;

        let mut matching: Vec<Booking> = self
            .bookings
            .read()
            .await
            .values()
            .filter(|b| filter.matches(b))
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.start_time.cmp(&b.start_time).then(a.id.cmp(&b.id)));

        let total = matching.len() as u64;
        let skip = page.saturating_sub(1) as usize * limit as usize;
        let items = matching.into_iter().skip(skip).take(limit as usize).collect();
        Ok((items, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::booking::{BookingStatus, ServiceType};
    use crate::domain::foundation::UserId;

    fn new_booking(start: Timestamp) -> NewBooking {
        NewBooking {
            user_id: UserId::from_raw(1),
            provider_id: UserId::from_raw(2),
            service_type: ServiceType::Consultation,
            start_time: start,
            end_time: start.plus_minutes(30),
            status: BookingStatus::Confirmed,
        }
    }

    #[tokio::test]
    async fn create_assigns_sequential_ids() {
        let repo = InMemoryBookingRepository::new();
        let start = Timestamp::now().plus_minutes(60);

        let first = repo.create(new_booking(start)).await.unwrap();
        let second = repo.create(new_booking(start)).await.unwrap();

        assert_eq!(first.id, BookingId::from_raw(1));
        assert_eq!(second.id, BookingId::from_raw(2));
        assert_eq!(repo.find_by_id(first.id).await.unwrap(), Some(first));
    }

    #[tokio::test]
    async fn list_orders_by_start_and_paginates() {
        let repo = InMemoryBookingRepository::new();
        let base = Timestamp::now().plus_minutes(60);
        for offset in [30, 10, 20] {
            repo.create(new_booking(base.plus_minutes(offset))).await.unwrap();
        }

        let (first_page, total) = repo.list(&BookingFilter::default(), 1, 2).await.unwrap();
        let (second_page, _) = repo.list(&BookingFilter::default(), 2, 2).await.unwrap();

        assert_eq!(total, 3);
        assert_eq!(first_page.len(), 2);
        assert!(first_page[0].start_time.is_before(&first_page[1].start_time));
        assert_eq!(second_page.len(), 1);
        assert_eq!(second_page[0].start_time, base.plus_minutes(30));
    }

    #[tokio::test]
    async fn forced_failure_surfaces_database_error() {
        let repo = InMemoryBookingRepository::new();
        repo.fail_with("disk on fire").await;

        let err = repo.create(new_booking(Timestamp::now())).await.unwrap_err();

        assert_eq!(err.code, crate::domain::foundation::ErrorCode::DatabaseError);
        assert_eq!(repo.create_calls(), 1);
        assert!(repo.is_empty().await);
    }
}
