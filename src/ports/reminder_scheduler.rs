//! ReminderScheduler port - One-shot timed callbacks keyed by name.

use std::fmt;

use futures::future::BoxFuture;
use thiserror::Error;

use crate::domain::foundation::{BookingId, Timestamp};

/// Unique name of a pending reminder.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReminderKey(String);

impl ReminderKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// `reminder-<bookingId>`.
    pub fn for_booking(id: BookingId) -> Self {
        Self(format!("reminder-{}", id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReminderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Work performed when a reminder fires. Runs at most once.
pub type ReminderJob = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send + 'static>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("Reminder '{0}' is already scheduled")]
    DuplicateKey(ReminderKey),
}

/// Port for scheduling reminders.
pub trait ReminderScheduler: Send + Sync {
    /// Registers `job` to run once at `fire_at`.
    ///
    /// A `fire_at` at or before now fires immediately.
    ///
    /// # Errors
    ///
    /// - `DuplicateKey` if `key` is still pending
    fn arm(&self, key: ReminderKey, fire_at: Timestamp, job: ReminderJob)
        -> Result<(), SchedulerError>;

    /// Removes a pending reminder. Returns false if nothing was pending.
    fn cancel(&self, key: &ReminderKey) -> bool;

    fn is_scheduled(&self, key: &ReminderKey) -> bool;

    fn pending_count(&self) -> usize;
}
