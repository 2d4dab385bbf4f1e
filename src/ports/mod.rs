//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Messaging
//!
//! - `EventBus` - Publish/subscribe broker connection
//! - `AudienceBroadcaster` - Real-time delivery to audience groups
//! - `BookingNotifier` - Direct notification path used by reminders
//!
//! ## Infrastructure
//!
//! - `BookingRepository` - Booking persistence
//! - `ReminderScheduler` - One-shot timed callbacks
//! - `TokenVerifier` - Access token verification
//! - `Clock` - Source of the current time

mod audience_broadcaster;
mod booking_notifier;
mod booking_repository;
mod clock;
mod event_bus;
mod reminder_scheduler;
mod token_verifier;

pub use audience_broadcaster::{AudienceBroadcaster, DeliveryError};
pub use booking_notifier::BookingNotifier;
pub use booking_repository::BookingRepository;
pub use clock::{Clock, FixedClock, SystemClock};
pub use event_bus::{BusConnectionState, BusError, BusSubscription, EventBus};
pub use reminder_scheduler::{ReminderJob, ReminderKey, ReminderScheduler, SchedulerError};
pub use token_verifier::TokenVerifier;
