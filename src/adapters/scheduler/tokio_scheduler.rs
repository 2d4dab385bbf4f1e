//! Reminder scheduler built on tokio timers.
//!
//! Each armed reminder is a spawned task that sleeps until its fire time.
//! The registry maps keys to the task's abort handle plus a generation
//! number; a task only runs its job if it can still remove its own entry,
//! so a cancelled reminder never fires even if the abort races the timer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::AbortHandle;

use crate::domain::foundation::Timestamp;
use crate::ports::{Clock, ReminderJob, ReminderKey, ReminderScheduler, SchedulerError};

struct Entry {
    generation: u64,
    handle: AbortHandle,
}

#[derive(Default)]
struct Registry {
    entries: Mutex<HashMap<ReminderKey, Entry>>,
    next_generation: AtomicU64,
}

impl Registry {
    /// Removes `key` only if it still belongs to `generation`.
    fn claim(&self, key: &ReminderKey, generation: u64) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.get(key) {
            Some(entry) if entry.generation == generation => {
                entries.remove(key);
                true
            }
            _ => false,
        }
    }
}

/// In-memory reminder scheduler. Pending reminders do not survive a restart.
pub struct TokioReminderScheduler {
    registry: Arc<Registry>,
    clock: Arc<dyn Clock>,
}

impl TokioReminderScheduler {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            registry: Arc::new(Registry::default()),
            clock,
        }
    }

    /// Aborts every pending reminder.
    pub fn shutdown(&self) {
        let drained: Vec<(ReminderKey, Entry)> = self
            .registry
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .collect();

        for (_, entry) in &drained {
            entry.handle.abort();
        }
        tracing::info!(aborted = drained.len(), "Reminder scheduler stopped");
    }
}

impl ReminderScheduler for TokioReminderScheduler {
    fn arm(
        &self,
        key: ReminderKey,
        fire_at: Timestamp,
        job: ReminderJob,
    ) -> Result<(), SchedulerError> {
        let mut entries = self
            .registry
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if entries.contains_key(&key) {
            return Err(SchedulerError::DuplicateKey(key));
        }

        // Past fire times yield a zero delay.
        let delay = fire_at
            .duration_since(&self.clock.now())
            .to_std()
            .unwrap_or_default();
        // Anchored here, not when the task is first polled.
        let deadline = tokio::time::Instant::now() + delay;
        let generation = self.registry.next_generation.fetch_add(1, Ordering::Relaxed);

        let registry = Arc::clone(&self.registry);
        let task_key = key.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if !registry.claim(&task_key, generation) {
                return;
            }
            tracing::debug!(key = %task_key, "Reminder fired");
            job().await;
        });

        tracing::debug!(key = %key, delay_ms = delay.as_millis() as u64, "Reminder armed");
        entries.insert(
            key,
            Entry {
                generation,
                handle: task.abort_handle(),
            },
        );
        Ok(())
    }

    fn cancel(&self, key: &ReminderKey) -> bool {
        let removed = self
            .registry
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);

        match removed {
            Some(entry) => {
                entry.handle.abort();
                tracing::debug!(key = %key, "Reminder cancelled");
                true
            }
            None => false,
        }
    }

    fn is_scheduled(&self, key: &ReminderKey) -> bool {
        self.registry
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    fn pending_count(&self) -> usize {
        self.registry
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::FixedClock;
    use futures::FutureExt;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn scheduler_at(now: Timestamp) -> TokioReminderScheduler {
        TokioReminderScheduler::new(Arc::new(FixedClock::new(now)))
    }

    fn counting_job(counter: &Arc<AtomicUsize>) -> ReminderJob {
        let counter = Arc::clone(counter);
        Box::new(move || {
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            .boxed()
        })
    }

    /// Lets spawned tasks observe the current (paused) time.
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fires_once_at_fire_time() {
        let now = Timestamp::from_unix_secs(1_700_000_000);
        let scheduler = scheduler_at(now);
        let fired = Arc::new(AtomicUsize::new(0));
        let key = ReminderKey::new("reminder-1");

        scheduler
            .arm(key.clone(), now.plus_minutes(5), counting_job(&fired))
            .unwrap();

        tokio::time::advance(Duration::from_secs(299)).await;
        settle().await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(scheduler.is_scheduled(&key));

        tokio::time::advance(Duration::from_secs(2)).await;
        settle().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!scheduler.is_scheduled(&key));

        tokio::time::advance(Duration::from_secs(3600)).await;
        settle().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn past_fire_time_fires_immediately() {
        let now = Timestamp::from_unix_secs(1_700_000_000);
        let scheduler = scheduler_at(now);
        let fired = Arc::new(AtomicUsize::new(0));

        scheduler
            .arm(ReminderKey::new("reminder-2"), now.minus_minutes(30), counting_job(&fired))
            .unwrap();
        settle().await;

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_key_is_rejected_while_pending() {
        let now = Timestamp::from_unix_secs(1_700_000_000);
        let scheduler = scheduler_at(now);
        let fired = Arc::new(AtomicUsize::new(0));
        let key = ReminderKey::new("reminder-3");

        scheduler
            .arm(key.clone(), now.plus_minutes(1), counting_job(&fired))
            .unwrap();
        let second = scheduler.arm(key.clone(), now.plus_minutes(2), counting_job(&fired));

        assert_eq!(second, Err(SchedulerError::DuplicateKey(key)));
        assert_eq!(scheduler.pending_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn key_can_be_reused_after_firing() {
        let now = Timestamp::from_unix_secs(1_700_000_000);
        let scheduler = scheduler_at(now);
        let fired = Arc::new(AtomicUsize::new(0));
        let key = ReminderKey::new("reminder-4");

        scheduler.arm(key.clone(), now, counting_job(&fired)).unwrap();
        settle().await;

        assert!(scheduler.arm(key, now, counting_job(&fired)).is_ok());
        settle().await;
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_reminder_never_fires() {
        let now = Timestamp::from_unix_secs(1_700_000_000);
        let scheduler = scheduler_at(now);
        let fired = Arc::new(AtomicUsize::new(0));
        let key = ReminderKey::new("reminder-5");

        scheduler
            .arm(key.clone(), now.plus_minutes(1), counting_job(&fired))
            .unwrap();
        assert!(scheduler.cancel(&key));
        assert!(!scheduler.cancel(&key));

        tokio::time::advance(Duration::from_secs(120)).await;
        settle().await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_aborts_everything_pending() {
        let now = Timestamp::from_unix_secs(1_700_000_000);
        let scheduler = scheduler_at(now);
        let fired = Arc::new(AtomicUsize::new(0));

        for i in 0..3 {
            scheduler
                .arm(ReminderKey::new(format!("reminder-{}", i)), now.plus_minutes(1), counting_job(&fired))
                .unwrap();
        }
        scheduler.shutdown();

        tokio::time::advance(Duration::from_secs(120)).await;
        settle().await;
        assert_eq!(scheduler.pending_count(), 0);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
