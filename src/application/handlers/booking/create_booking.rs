//! CreateBookingHandler - Command handler for creating bookings.
//!
//! Persists the booking, then announces it on the bus and arms the
//! start-time reminder. Only validation and persistence failures reach the
//! caller; a failed publish or a failed reminder is logged and the booking
//! still counts as created.

use std::sync::Arc;

use chrono::Duration;
use futures::FutureExt;

use crate::domain::booking::{
    validate_time_range, Booking, BookingCreated, BookingError, BookingStatus, BookingView,
    NewBooking, ServiceType, BOOKING_CREATED_CHANNEL,
};
use crate::domain::foundation::{Timestamp, UserId};
use crate::ports::{
    BookingNotifier, BookingRepository, Clock, EventBus, ReminderJob, ReminderKey,
    ReminderScheduler,
};

/// Default lead time between the reminder and the booking start.
pub const DEFAULT_REMINDER_OFFSET_MINS: i64 = 10;

/// Command to create a booking on behalf of an authenticated user.
#[derive(Debug, Clone)]
pub struct CreateBookingCommand {
    pub provider_id: UserId,
    pub service_type: ServiceType,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
}

/// Handler for creating bookings.
pub struct CreateBookingHandler {
    repository: Arc<dyn BookingRepository>,
    bus: Arc<dyn EventBus>,
    scheduler: Arc<dyn ReminderScheduler>,
    notifier: Arc<dyn BookingNotifier>,
    clock: Arc<dyn Clock>,
    reminder_offset: Duration,
}

impl CreateBookingHandler {
    pub fn new(
        repository: Arc<dyn BookingRepository>,
        bus: Arc<dyn EventBus>,
        scheduler: Arc<dyn ReminderScheduler>,
        notifier: Arc<dyn BookingNotifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            bus,
            scheduler,
            notifier,
            clock,
            reminder_offset: Duration::minutes(DEFAULT_REMINDER_OFFSET_MINS),
        }
    }

    pub fn with_reminder_offset(mut self, offset: Duration) -> Self {
        self.reminder_offset = offset;
        self
    }

    pub async fn handle(
        &self,
        cmd: CreateBookingCommand,
        owner: UserId,
    ) -> Result<BookingView, BookingError> {
        // 1. Validate the window against the current time
        validate_time_range(cmd.start_time, cmd.end_time, self.clock.now())?;

        // 2. Persist
        let booking = self
            .repository
            .create(NewBooking {
                user_id: owner,
                provider_id: cmd.provider_id,
                service_type: cmd.service_type,
                start_time: cmd.start_time,
                end_time: cmd.end_time,
                status: BookingStatus::Confirmed,
            })
            .await
            .map_err(|e| {
                tracing::error!(user_id = %owner, error = %e, "Failed to persist booking");
                BookingError::from(e)
            })?;

        tracing::info!(
            booking_id = %booking.id,
            user_id = %booking.user_id,
            provider_id = %booking.provider_id,
            "Booking created"
        );

        // 3. Announce; failure is not rolled back
        self.publish_created(&booking).await;

        // 4. Arm the reminder; failure is not rolled back
        self.arm_reminder(&booking);

        Ok(booking.view())
    }

    async fn publish_created(&self, booking: &Booking) {
        let payload = match BookingCreated::new(booking.clone()).to_payload() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(
                    booking_id = %booking.id,
                    failure = "publish",
                    error = %e,
                    "Failed to encode booking event"
                );
                return;
            }
        };

        if let Err(e) = self.bus.publish(BOOKING_CREATED_CHANNEL, &payload).await {
            tracing::warn!(
                booking_id = %booking.id,
                channel = BOOKING_CREATED_CHANNEL,
                failure = "publish",
                error = %e,
                "Booking event not published"
            );
        }
    }

    fn arm_reminder(&self, booking: &Booking) {
        let key = ReminderKey::for_booking(booking.id);
        let fire_at = booking.start_time.minus(self.reminder_offset);

        let notifier = Arc::clone(&self.notifier);
        let snapshot = booking.clone();
        let job: ReminderJob = Box::new(move || {
            async move {
                notifier.notify(snapshot).await;
            }
            .boxed()
        });

        if let Err(e) = self.scheduler.arm(key.clone(), fire_at, job) {
            tracing::warn!(
                booking_id = %booking.id,
                key = %key,
                failure = "reminder",
                error = %e,
                "Booking reminder not scheduled"
            );
        }
    }
}
