//! Reminder scheduler adapters.

mod tokio_scheduler;

pub use tokio_scheduler::TokioReminderScheduler;
